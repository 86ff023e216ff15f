use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Pipeline selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    /// Collect from the cloud and analyze in one run.
    Online,
    /// Collect from the cloud and persist to the data directory.
    OfflineCollect,
    /// Reload persisted state and re-derive without network access.
    OfflineAnalyze,
}

impl FromStr for Mode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Mode::Online),
            "offline-collect" => Ok(Mode::OfflineCollect),
            "offline-analyze" => Ok(Mode::OfflineAnalyze),
            other => Err(crate::Error::InvalidMode(other.to_string())),
        }
    }
}

/// Project-id / display-name prefixes of Google-provisioned system projects.
pub const SYSTEM_PROJECT_PREFIXES: [&str; 8] = [
    "sys-",
    "script-editor-",
    "apps-script-",
    "system-",
    "firebase-",
    "cloud-build-",
    "gcf-",
    "gae-",
];

pub fn is_system_project(id_or_name: &str) -> bool {
    SYSTEM_PROJECT_PREFIXES.iter().any(|p| id_or_name.starts_with(p))
}

#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    pub mode: Mode,
    /// Numeric organization id, e.g. `123456789`.
    pub org_id: String,
    pub collect_pabs: bool,
    pub collect_deny_policies: bool,
    pub data_dir: PathBuf,
    /// CAI asset types to collect; empty collects every supported type.
    pub asset_types: Vec<String>,
    pub include_system_projects: bool,
    /// Pause between deny-policy listing pages to stay under quota.
    pub deny_page_interval: Duration,
    /// Fan-out width for project collection.
    pub concurrency: usize,
}

impl ProcessorConfig {
    pub fn new(mode: Mode, org_id: impl Into<String>) -> Self {
        Self {
            mode,
            org_id: org_id.into(),
            collect_pabs: false,
            collect_deny_policies: false,
            data_dir: PathBuf::from("data"),
            asset_types: Vec::new(),
            include_system_projects: false,
            deny_page_interval: Duration::from_secs(10),
            concurrency: 10,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mode_round_trip() {
        assert_eq!("online".parse::<Mode>().unwrap(), Mode::Online);
        assert_eq!("offline-collect".parse::<Mode>().unwrap(), Mode::OfflineCollect);
        assert_eq!("offline-analyze".parse::<Mode>().unwrap(), Mode::OfflineAnalyze);
        assert!("replay".parse::<Mode>().is_err());
    }

    #[test]
    fn system_project_prefixes() {
        assert!(is_system_project("sys-1234"));
        assert!(is_system_project("gcf-sources-1234"));
        assert!(!is_system_project("production"));
        assert!(!is_system_project("my-sys-project"));
    }
}
