use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};

const LOCK_POLL: Duration = Duration::from_millis(50);

pub fn file_exists<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref().exists()
}

/// Case-insensitive substring match over the whole file.
/// An unreadable file contains nothing.
pub fn contains_ci<P: AsRef<Path>>(path: P, needle: &str) -> bool {
    match std::fs::read_to_string(path) {
        Ok(content) => content.to_lowercase().contains(&needle.to_lowercase()),
        Err(_) => false,
    }
}

/// Takes an exclusive advisory lock on `file`, giving up after `wait`
fn lock_exclusive(mut file: File, wait: Duration) -> io::Result<Flock<File>> {
    let deadline = Instant::now() + wait;

    loop {
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => return Ok(lock),
            Err((f, errno)) if errno == Errno::EWOULDBLOCK => {
                if Instant::now() >= deadline {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "timed out waiting for file lock",
                    ));
                }

                file = f;
                thread::sleep(LOCK_POLL);
            }
            Err((_, errno)) => return Err(errno.into()),
        }
    }
}

/// Appends `line` under an exclusive lock. The file must already exist.
pub fn append_line_locked<P: AsRef<Path>>(
    path: P,
    line: &str,
    wait: Duration,
) -> io::Result<()> {
    let file = OpenOptions::new().read(true).append(true).open(path)?;
    let lock = lock_exclusive(file, wait)?;
    let mut f: &File = &lock;

    let mut content = String::new();
    f.read_to_string(&mut content)?;

    let mut entry = String::new();
    if !content.is_empty() && !content.ends_with('\n') {
        entry.push('\n');
    }
    entry.push_str(line);
    entry.push('\n');

    f.write_all(entry.as_bytes())
}

/// Drops every line for which `matches` returns true, under an exclusive
/// lock. Returns the number of lines removed.
pub fn remove_lines_locked<P, F>(
    path: P,
    matches: F,
    wait: Duration,
) -> io::Result<usize>
where
    P: AsRef<Path>,
    F: Fn(&str) -> bool,
{
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let lock = lock_exclusive(file, wait)?;
    let mut f: &File = &lock;

    let mut content = String::new();
    f.read_to_string(&mut content)?;

    let mut kept = String::with_capacity(content.len());
    let mut removed = 0;
    for line in content.lines() {
        if matches(line) {
            removed += 1;
            continue;
        }

        kept.push_str(line);
        kept.push('\n');
    }

    if removed == 0 {
        return Ok(0);
    }

    f.seek(SeekFrom::Start(0))?;
    f.set_len(0)?;
    f.write_all(kept.as_bytes())?;

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("dasd.conf");
        std::fs::write(&conf, "0.0.0100").unwrap();

        let wait = Duration::from_millis(100);
        append_line_locked(&conf, "0.0.0200", wait).unwrap();
        append_line_locked(&conf, "0.0.0300", wait).unwrap();
        assert_eq!(
            std::fs::read_to_string(&conf).unwrap(),
            "0.0.0100\n0.0.0200\n0.0.0300\n"
        );

        assert!(contains_ci(&conf, "0.0.0200"));
        let removed =
            remove_lines_locked(&conf, |l| l.contains("0.0.0200"), wait)
                .unwrap();
        assert_eq!(removed, 1);
        assert!(!contains_ci(&conf, "0.0.0200"));
        assert_eq!(
            std::fs::read_to_string(&conf).unwrap(),
            "0.0.0100\n0.0.0300\n"
        );
    }

    #[test]
    fn test_append_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("missing.conf");

        assert!(append_line_locked(&conf, "0.0.0200", Duration::ZERO).is_err());
        assert!(!file_exists(&conf));
    }

    #[test]
    fn test_contains_ci() {
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("dasd.conf");
        std::fs::write(&conf, "0.0.ABCD\n").unwrap();

        assert!(contains_ci(&conf, "0.0.abcd"));
        assert!(!contains_ci(dir.path().join("nope"), "0.0.abcd"));
    }
}
