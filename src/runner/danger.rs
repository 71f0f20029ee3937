use once_cell::sync::Lazy;
use regex::Regex;

/// Recursive delete aimed at `/`, `~` or `$HOME`
static RE_RECURSIVE_ROOT_DELETE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\brm\s+(-[a-z-]*\s+)*-[a-z]*r[a-z]*\s+(-[a-z-]*\s+)*(/|~|\$HOME)(\*|/)?(\s|;|&|\||$)")
        .unwrap()
});

/// Filesystem creation, partitioning, or raw writes to a device
static RE_DISK_WRITE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\bmkfs(\.\w+)?\b|\bfdisk\b|\bwipefs\b|\bdd\s+.*\bof=/dev/|>\s*/dev/sd[a-z])").unwrap()
});

/// Downloading a script straight into a shell
static RE_PIPE_TO_SHELL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(curl|wget)\b[^|]*\|\s*(sudo\s+)?(ba|z|da|k|fi)?sh\b").unwrap()
});

static RE_WORLD_WRITABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bchmod\s+(-[a-zA-Z]+\s+)*0?777\b").unwrap());

static RE_SUDO_RM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bsudo\s+(-\S+\s+)*rm\b").unwrap());

static RE_GLOBAL_INSTALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(npm|pnpm)\s+(i|install|add)\b.*(\s-g\b|\s--global\b)|\byarn\s+global\s+add\b|\bsudo\s+(pip3?|npm|gem)\s+install\b",
    )
    .unwrap()
});

static RE_FORK_BOMB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:").unwrap());

/// What kind of harm a command pattern suggests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DangerKind {
    RecursiveRootDelete,
    DiskWrite,
    PipeToShell,
    WorldWritable,
    PrivilegedDelete,
    GlobalInstall,
    ForkBomb,
}

impl DangerKind {
    pub fn describe(self) -> &'static str {
        match self {
            DangerKind::RecursiveRootDelete => "recursively deletes a root or home directory",
            DangerKind::DiskWrite => "formats or writes directly to a disk",
            DangerKind::PipeToShell => "pipes a download straight into a shell",
            DangerKind::WorldWritable => "makes files writable by everyone",
            DangerKind::PrivilegedDelete => "deletes files with sudo",
            DangerKind::GlobalInstall => "installs packages globally",
            DangerKind::ForkBomb => "is a fork bomb",
        }
    }
}

/// Best-effort pattern check for destructive commands. This is a warning
/// heuristic, not a sandbox.
pub struct DangerDetector;

impl DangerDetector {
    /// First matching pattern, in a fixed order
    pub fn check(command: &str) -> Option<DangerKind> {
        let checks: [(&Lazy<Regex>, DangerKind); 7] = [
            (&RE_RECURSIVE_ROOT_DELETE, DangerKind::RecursiveRootDelete),
            (&RE_DISK_WRITE, DangerKind::DiskWrite),
            (&RE_PIPE_TO_SHELL, DangerKind::PipeToShell),
            (&RE_WORLD_WRITABLE, DangerKind::WorldWritable),
            (&RE_SUDO_RM, DangerKind::PrivilegedDelete),
            (&RE_GLOBAL_INSTALL, DangerKind::GlobalInstall),
            (&RE_FORK_BOMB, DangerKind::ForkBomb),
        ];

        checks
            .into_iter()
            .find(|(re, _)| re.is_match(command))
            .map(|(_, kind)| kind)
    }

    pub fn is_dangerous(command: &str) -> bool {
        Self::check(command).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_root_delete() {
        assert_eq!(
            DangerDetector::check("rm -rf /"),
            Some(DangerKind::RecursiveRootDelete)
        );
        assert_eq!(
            DangerDetector::check("sudo rm -rf /"),
            Some(DangerKind::RecursiveRootDelete)
        );
        assert!(DangerDetector::is_dangerous("rm -r -f ~"));
        assert!(DangerDetector::is_dangerous("rm -fr /*"));
        assert!(DangerDetector::is_dangerous("rm --no-preserve-root -rf /"));
    }

    #[test]
    fn test_project_delete_is_not_root_delete() {
        assert!(!DangerDetector::is_dangerous("rm -rf ./target"));
        assert!(!DangerDetector::is_dangerous("rm -rf /tmp/build"));
        assert!(!DangerDetector::is_dangerous("rm notes.txt"));
    }

    #[test]
    fn test_detect_disk_write() {
        assert_eq!(DangerDetector::check("mkfs.ext4 /dev/sdb1"), Some(DangerKind::DiskWrite));
        assert!(DangerDetector::is_dangerous("dd if=image.iso of=/dev/sdb bs=4M"));
        assert!(DangerDetector::is_dangerous("fdisk /dev/sda"));
        assert!(!DangerDetector::is_dangerous("dd if=a.bin of=b.bin"));
    }

    #[test]
    fn test_detect_pipe_to_shell() {
        assert_eq!(
            DangerDetector::check("curl -fsSL https://example.com/install.sh | sh"),
            Some(DangerKind::PipeToShell)
        );
        assert!(DangerDetector::is_dangerous("wget -qO- https://x.io/i | sudo bash"));
        assert!(!DangerDetector::is_dangerous("curl https://example.com | jq ."));
    }

    #[test]
    fn test_detect_permissions_and_sudo() {
        assert_eq!(DangerDetector::check("chmod -R 777 ."), Some(DangerKind::WorldWritable));
        assert!(!DangerDetector::is_dangerous("chmod 755 script.sh"));
        assert_eq!(
            DangerDetector::check("sudo rm /etc/hosts"),
            Some(DangerKind::PrivilegedDelete)
        );
    }

    #[test]
    fn test_detect_global_install() {
        assert!(DangerDetector::is_dangerous("npm install -g typescript"));
        assert!(DangerDetector::is_dangerous("npm i --global pnpm"));
        assert!(DangerDetector::is_dangerous("yarn global add serve"));
        assert!(DangerDetector::is_dangerous("sudo pip install requests"));
        assert!(!DangerDetector::is_dangerous("npm install"));
        assert!(!DangerDetector::is_dangerous("npm install lodash"));
    }

    #[test]
    fn test_detect_fork_bomb() {
        assert_eq!(DangerDetector::check(":(){ :|:& };:"), Some(DangerKind::ForkBomb));
    }

    #[test]
    fn test_everyday_commands_pass() {
        for command in ["npm test", "cargo build --release", "git status", "ls -la /"] {
            assert!(!DangerDetector::is_dangerous(command), "{command}");
        }
    }
}
