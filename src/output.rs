use crate::config::{same_dir, Config, DASHBOARD_FILE, METRICS_FILE};
use crate::error::{DashboardError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s).map_err(|e| DashboardError::io(path, e))?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Replace `dst` with a fresh copy of `src`. Re-running yields the same tree
/// rather than accumulating stale files. A missing `src` is skipped.
pub fn copy_dir_fresh(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        debug!("asset directory {} not present, skipping", src.display());
        return Ok(0);
    }
    if same_dir(src, dst) {
        return Ok(0);
    }
    if dst.exists() {
        fs::remove_dir_all(dst).map_err(|e| DashboardError::io(dst, e))?;
    }
    let mut copied = 0usize;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
            DashboardError::io(path, e.into())
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| DashboardError::io(&target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| DashboardError::io(&target, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Result of writing one output location.
#[derive(Debug)]
pub struct LocationOutcome {
    pub dashboard: PathBuf,
    pub result: Result<()>,
}

impl LocationOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

struct Target {
    dir: PathBuf,
    with_assets: bool,
    with_metrics: bool,
}

fn targets(config: &Config) -> Vec<Target> {
    let reports = config.reports_dir();
    let mut out = vec![
        Target {
            dir: config.root.clone(),
            with_assets: false,
            with_metrics: false,
        },
        Target {
            dir: reports.clone(),
            with_assets: true,
            with_metrics: true,
        },
    ];
    if let Some(dir) = &config.output_dir {
        if same_dir(dir, &reports) || same_dir(dir, &config.root) {
            debug!("OUTPUT_DIR {} already written, skipping", dir.display());
        } else {
            out.push(Target {
                dir: dir.clone(),
                with_assets: true,
                with_metrics: false,
            });
        }
    }
    out
}

fn write_location<M: Serialize>(target: &Target, html: &str, metrics: &M, config: &Config) -> Result<()> {
    fs::create_dir_all(&target.dir).map_err(|e| DashboardError::io(&target.dir, e))?;
    if target.with_assets {
        for src in config.asset_dirs() {
            if let Some(name) = src.file_name() {
                let n = copy_dir_fresh(&src, &target.dir.join(name))?;
                debug!("copied {} files from {}", n, src.display());
            }
        }
    }
    if target.with_metrics {
        write_json(&target.dir.join(METRICS_FILE), metrics)?;
    }
    let path = target.dir.join(DASHBOARD_FILE);
    fs::write(&path, html).map_err(|e| DashboardError::io(&path, e))?;
    Ok(())
}

/// Write the dashboard to every configured location. Each location is
/// attempted regardless of how the others went.
pub fn publish<M: Serialize>(html: &str, metrics: &M, config: &Config) -> Vec<LocationOutcome> {
    targets(config)
        .into_iter()
        .map(|target| {
            let result = write_location(&target, html, metrics, config);
            let dashboard = target.dir.join(DASHBOARD_FILE);
            match &result {
                Ok(()) => info!("wrote {}", dashboard.display()),
                Err(e) => warn!("failed to write {}: {}", dashboard.display(), e),
            }
            LocationOutcome { dashboard, result }
        })
        .collect()
}

/// Concepts whose whitepaper PDF is not in the whitepaper directory. Their
/// links are still rendered.
pub fn missing_whitepapers<'a>(config: &Config, concepts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let missing: Vec<String> = concepts
        .into_iter()
        .filter(|c| !config.whitepaper_path(c).is_file())
        .map(str::to_string)
        .collect();
    for c in &missing {
        warn!("no whitepaper found for concept '{}'", c);
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_for(root: &Path, output_dir: Option<&str>) -> Config {
        let out = output_dir.map(str::to_string);
        Config::from_lookup(root, move |k| if k == "OUTPUT_DIR" { out.clone() } else { None })
    }

    fn seed_assets(root: &Path) {
        fs::create_dir_all(root.join("Whitepapers")).unwrap();
        fs::write(root.join("Whitepapers/Skin_graft.pdf"), b"%PDF").unwrap();
        fs::create_dir_all(root.join("visuals")).unwrap();
        fs::write(root.join("visuals/logo.png"), b"png").unwrap();
    }

    #[test]
    fn test_publish_root_reports_and_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        seed_assets(root);
        let config = config_for(root, Some("site"));

        let outcomes = publish("<html></html>", &json!({"ok": true}), &config);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(LocationOutcome::is_ok));
        assert!(root.join("executive-dashboard.html").is_file());
        assert!(root.join("reports/executive-dashboard.html").is_file());
        assert!(root.join("reports/Whitepapers/Skin_graft.pdf").is_file());
        assert!(root.join("reports/visuals/logo.png").is_file());
        assert!(root.join("reports/dashboard-metrics.json").is_file());
        assert!(root.join("site/executive-dashboard.html").is_file());
        assert!(root.join("site/Whitepapers/Skin_graft.pdf").is_file());
    }

    #[test]
    fn test_output_dir_same_as_reports_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), Some("reports"));
        let outcomes = publish("x", &json!({}), &config);
        assert_eq!(outcomes.len(), 2);
    }

    #[test]
    fn test_rerun_replaces_stale_assets() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        seed_assets(root);
        let config = config_for(root, None);
        publish("first", &json!({}), &config);
        fs::write(root.join("reports/Whitepapers/stale.pdf"), b"old").unwrap();

        publish("second", &json!({}), &config);
        assert!(!root.join("reports/Whitepapers/stale.pdf").exists());
        assert_eq!(
            fs::read_to_string(root.join("reports/executive-dashboard.html")).unwrap(),
            "second"
        );
    }

    #[test]
    fn test_failed_location_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // A plain file where the output directory should be.
        fs::write(root.join("blocked"), b"").unwrap();
        let config = config_for(root, Some("blocked"));

        let outcomes = publish("x", &json!({}), &config);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert!(outcomes[1].is_ok());
        assert!(!outcomes[2].is_ok());
        assert!(root.join("reports/executive-dashboard.html").is_file());
    }

    #[test]
    fn test_missing_whitepapers_listed() {
        let dir = tempfile::tempdir().unwrap();
        seed_assets(dir.path());
        let config = config_for(dir.path(), None);
        let missing = missing_whitepapers(&config, ["Skin_graft", "E_M"]);
        assert_eq!(missing, vec!["E_M".to_string()]);
    }
}
