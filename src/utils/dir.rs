use std::{env, io, path::PathBuf};

use anyhow::{anyhow, Result};

const APPLICATION_NAME: &str = "keytrail";

pub fn create_application_default_path() -> Result<PathBuf> {
    let path = {
        #[cfg(windows)]
        {
            let mut path = env::var("APPDATA")
                .map(PathBuf::from)
                .map_err(|_| anyhow!("APPDATA should be present on Windows"))?;
            path.push(APPLICATION_NAME);
            path
        }
        #[cfg(target_os = "macos")]
        {
            let mut path = env::var("HOME")
                .map(PathBuf::from)
                .map_err(|_| anyhow!("Couldn't find HOME"))?;
            path.push("Library/Application Support");
            path.push(APPLICATION_NAME);
            path
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let mut path = env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| {
                        let mut path = PathBuf::from(home);
                        path.push(".local/state");
                        path
                    })
                })
                .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))?;
            path.push(APPLICATION_NAME);
            path
        }
    };

    create_dir(path)
}

/// Directory holding the persisted counters and history.
pub fn data_dir(app_dir: &std::path::Path) -> PathBuf {
    app_dir.join("data")
}

pub fn log_dir(app_dir: &std::path::Path) -> PathBuf {
    app_dir.join("logs")
}

fn create_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}
