use std::fmt::{Display, Formatter};
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

use crate::governance::Policy;

pub const MART_FILE_NAME: &str = "mart.sqlite";
pub const DEFAULT_OUT_DIR: &str = ".govquery/output";

/// Where the CLI reads and writes: the mart and evaluation reports live
/// under `out_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
}

impl RuntimePaths {
    #[must_use]
    pub fn mart_path(&self) -> PathBuf {
        self.out_dir.join(MART_FILE_NAME)
    }

    /// The mart path, only once `govquery seed` has created it.
    pub fn existing_mart(&self) -> Result<PathBuf> {
        let mart_path = self.mart_path();
        if mart_path.is_dir() {
            bail!("mart path is a directory: {}", mart_path.display());
        }
        if !mart_path.is_file() {
            bail!(
                "mart not found at {}; run `govquery seed` first",
                mart_path.display()
            );
        }
        Ok(mart_path)
    }

    /// Resolves a user-supplied path (`~`, `~/...`, relative to `cwd`).
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        resolve_against(path, &self.home_dir, &self.cwd)
    }
}

pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    out_dir_override: Option<&Path>,
) -> Result<RuntimePaths> {
    for (label, path) in [("home_dir", home_dir), ("cwd", cwd)] {
        if !path.is_absolute() {
            bail!("{label} must be absolute: {}", path.display());
        }
    }

    let home_dir = collapse_dots(home_dir);
    let cwd = collapse_dots(cwd);
    let out_dir = match out_dir_override {
        Some(path) => resolve_against(path, &home_dir, &cwd)?,
        None => home_dir.join(DEFAULT_OUT_DIR),
    };
    if out_dir.exists() && !out_dir.is_dir() {
        bail!("out_dir is not a directory: {}", out_dir.display());
    }

    Ok(RuntimePaths {
        home_dir,
        cwd,
        out_dir,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    Default,
    File(PathBuf),
}

impl Display for PolicySource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// The active policy together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPolicy {
    pub policy: Policy,
    pub source: PolicySource,
}

pub fn resolve_policy(
    runtime_paths: &RuntimePaths,
    policy_path: Option<&Path>,
) -> Result<ResolvedPolicy> {
    let Some(path) = policy_path else {
        return Ok(ResolvedPolicy {
            policy: Policy::default(),
            source: PolicySource::Default,
        });
    };

    let resolved = runtime_paths.resolve(path)?;
    Ok(ResolvedPolicy {
        policy: Policy::load(&resolved)?,
        source: PolicySource::File(resolved),
    })
}

fn resolve_against(path: &Path, home_dir: &Path, base: &Path) -> Result<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => home_dir.join(rest),
        Err(_) => path.to_path_buf(),
    };
    if matches!(
        expanded.components().next(),
        Some(Component::Normal(first)) if first.to_string_lossy().starts_with('~')
    ) {
        bail!("only `~` and `~/...` home paths are supported: {}", path.display());
    }

    Ok(collapse_dots(&base.join(expanded)))
}

/// Removes `.` and folds `..` without touching the filesystem.
fn collapse_dots(path: &Path) -> PathBuf {
    path.components()
        .fold(PathBuf::new(), |mut collapsed, component| {
            match component {
                Component::CurDir => {}
                Component::ParentDir if collapsed.file_name().is_some() => {
                    collapsed.pop();
                }
                other => collapsed.push(other),
            }
            collapsed
        })
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::{PolicySource, RuntimePaths, resolve_policy, resolve_runtime_paths};

    fn paths_under(out_dir: &str) -> RuntimePaths {
        resolve_runtime_paths(
            Path::new("/home/analyst"),
            Path::new("/srv/bi"),
            Some(Path::new(out_dir)),
        )
        .expect("paths should resolve")
    }

    fn scratch_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{prefix}-{nanos}"));
        std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
        dir
    }

    #[test]
    fn mart_lives_under_default_out_dir() {
        let paths = resolve_runtime_paths(Path::new("/home/analyst"), Path::new("/srv/bi"), None)
            .expect("paths should resolve");

        assert_eq!(
            paths.mart_path(),
            Path::new("/home/analyst/.govquery/output/mart.sqlite")
        );
    }

    #[test]
    fn out_dir_override_expands_home_and_folds_dots() {
        assert_eq!(
            paths_under("~/marts/q4").out_dir,
            Path::new("/home/analyst/marts/q4")
        );
        assert_eq!(
            paths_under("./runs/../marts").out_dir,
            Path::new("/srv/bi/marts")
        );
        assert_eq!(paths_under("/tmp/mart").out_dir, Path::new("/tmp/mart"));
    }

    #[test]
    fn relative_roots_and_user_tilde_are_rejected() {
        let err = resolve_runtime_paths(Path::new("home"), Path::new("/srv/bi"), None)
            .expect_err("relative home must fail");
        assert!(err.to_string().contains("home_dir must be absolute"), "{err}");

        let err = resolve_runtime_paths(
            Path::new("/home/analyst"),
            Path::new("/srv/bi"),
            Some(Path::new("~finance/marts")),
        )
        .expect_err("~user syntax must fail");
        assert!(err.to_string().contains("home paths are supported"), "{err}");
    }

    #[test]
    fn out_dir_must_not_be_a_file() {
        let scratch = scratch_dir("govquery-config-outfile");
        let file = scratch.join("not-a-dir");
        std::fs::write(&file, "x").expect("file should be writable");

        let err = resolve_runtime_paths(&scratch, &scratch, Some(file.as_path()))
            .expect_err("file out_dir must fail");
        assert!(err.to_string().contains("not a directory"), "{err}");
    }

    #[test]
    fn existing_mart_requires_seeded_file() {
        let scratch = scratch_dir("govquery-config-mart");
        let paths = resolve_runtime_paths(&scratch, &scratch, Some(Path::new("out")))
            .expect("paths should resolve");

        let err = paths.existing_mart().expect_err("unseeded mart must fail");
        assert!(err.to_string().contains("govquery seed"), "{err}");

        std::fs::create_dir_all(paths.mart_path()).expect("dir should be creatable");
        let err = paths.existing_mart().expect_err("directory mart must fail");
        assert!(err.to_string().contains("is a directory"), "{err}");
    }

    #[test]
    fn policy_source_tracks_default_and_file() {
        let scratch = scratch_dir("govquery-config-policy");
        std::fs::write(
            scratch.join("policy.yml"),
            "allowed_tables: [fact_sales]\nmax_limit: 50\n",
        )
        .expect("policy should be writable");
        let paths = resolve_runtime_paths(&scratch, &scratch, None).expect("paths should resolve");

        let default = resolve_policy(&paths, None).expect("default policy");
        assert_eq!(default.source, PolicySource::Default);
        assert_eq!(default.policy.max_limit(), 500);

        let from_file = resolve_policy(&paths, Some(Path::new("policy.yml"))).expect("file policy");
        assert_eq!(from_file.source, PolicySource::File(scratch.join("policy.yml")));
        assert_eq!(from_file.policy.max_limit(), 50);
        assert!(!from_file.policy.allows_table("dim_region"));
    }
}
