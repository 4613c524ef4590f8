use std::env;
use std::path::PathBuf;

/// Directory name under the home directory holding installer state.
const APP_DIR: &str = ".installer";

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Option<PathBuf> {
    ["HOME", "USERPROFILE"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Default directory for session transcripts: `~/.installer/logs`.
pub fn default_log_dir() -> Option<PathBuf> {
    get_home_dir().map(|home| home.join(APP_DIR).join("logs"))
}

#[cfg(test)]
mod tests {
    use super::{default_log_dir, get_home_dir};
    use std::env;
    use std::path::PathBuf;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<F: FnOnce()>(home: Option<&str>, userprofile: Option<&str>, f: F) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let prev_home = env::var("HOME").ok();
        let prev_userprofile = env::var("USERPROFILE").ok();

        match home {
            Some(value) => env::set_var("HOME", value),
            None => env::remove_var("HOME"),
        }
        match userprofile {
            Some(value) => env::set_var("USERPROFILE", value),
            None => env::remove_var("USERPROFILE"),
        }

        f();

        match prev_home {
            Some(value) => env::set_var("HOME", value),
            None => env::remove_var("HOME"),
        }
        match prev_userprofile {
            Some(value) => env::set_var("USERPROFILE", value),
            None => env::remove_var("USERPROFILE"),
        }
    }

    #[test]
    fn get_home_dir_prefers_home() {
        with_env(Some("/tmp/home"), Some("/tmp/profile"), || {
            assert_eq!(get_home_dir(), Some(PathBuf::from("/tmp/home")));
        });
    }

    #[test]
    fn get_home_dir_falls_back_to_userprofile() {
        with_env(Some(""), Some("/tmp/profile"), || {
            assert_eq!(get_home_dir(), Some(PathBuf::from("/tmp/profile")));
        });
    }

    #[test]
    fn get_home_dir_none_when_unset() {
        with_env(None, None, || {
            assert!(get_home_dir().is_none());
            assert!(default_log_dir().is_none());
        });
    }

    #[test]
    fn default_log_dir_under_home() {
        with_env(Some("/tmp/home"), None, || {
            assert_eq!(
                default_log_dir(),
                Some(PathBuf::from("/tmp/home/.installer/logs"))
            );
        });
    }
}
