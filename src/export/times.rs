//! Best-effort directory timestamps. Failures are logged at debug level only.

use std::fs::{File, FileTimes};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use log::debug;

/// Set both access and modification time of `path` to `at`, then, when the
/// path lives on a WSL-mounted Windows drive, ask PowerShell to set the
/// creation time too.
pub fn set_dir_times(path: &Path, at: DateTime<Utc>) {
    let time = SystemTime::from(at);
    let times = FileTimes::new().set_accessed(time).set_modified(time);
    match File::open(path).and_then(|f| f.set_times(times)) {
        Ok(()) => {}
        Err(e) => debug!("could not set times on {}: {e}", path.display()),
    }

    if let Some(win_path) = windows_path(path)
        && let Some(powershell) = find_on_path("powershell.exe")
    {
        set_creation_time(&powershell, &win_path, at);
    }
}

/// `/mnt/c/Users/x` as `C:\Users\x`; `None` for anything not under a drive mount.
pub fn windows_path(path: &Path) -> Option<String> {
    let absolute = std::path::absolute(path).ok()?;
    let s = absolute.to_str()?;
    let rest = s.strip_prefix("/mnt/")?;
    let mut chars = rest.chars();
    let drive = chars.next().filter(char::is_ascii_alphabetic)?;
    let tail = chars.as_str();
    if !(tail.is_empty() || tail.starts_with('/')) {
        return None;
    }
    let tail = tail.trim_start_matches('/').replace('/', "\\");
    Some(format!("{}:\\{tail}", drive.to_ascii_uppercase()))
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn set_creation_time(powershell: &Path, win_path: &str, at: DateTime<Utc>) {
    let literal = win_path.replace('\'', "''");
    let script = format!(
        "$dt = [datetime]::Parse('{}'); \
         $item = Get-Item -LiteralPath '{literal}'; \
         $item.CreationTime = $dt; \
         $item.LastWriteTime = $dt",
        at.to_rfc3339()
    );
    let status = Command::new(powershell)
        .args(["-NoProfile", "-Command", &script])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        debug!("powershell unavailable for {win_path}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn drive_mounts_translate() {
        assert_eq!(
            windows_path(Path::new("/mnt/c/Users/me/out")).as_deref(),
            Some("C:\\Users\\me\\out")
        );
        assert_eq!(windows_path(Path::new("/mnt/d")).as_deref(), Some("D:\\"));
        assert_eq!(windows_path(Path::new("/mnt/wsl/x")), None);
        assert_eq!(windows_path(Path::new("/home/me/out")), None);
    }

    #[test]
    fn modification_time_is_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2023, 5, 1, 12, 30, 0).unwrap();
        set_dir_times(tmp.path(), at);
        let modified = std::fs::metadata(tmp.path()).unwrap().modified().unwrap();
        assert_eq!(DateTime::<Utc>::from(modified), at);
    }
}
