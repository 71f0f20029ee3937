use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};

static RE_VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{(\w+)\}").unwrap());

/// Where the annotated text lives, for `${file}`-style variables.
/// Either part may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentContext {
    pub file: Option<PathBuf>,
    pub workspace_folder: Option<PathBuf>,
}

impl DocumentContext {
    pub fn new(file: Option<PathBuf>, workspace_folder: Option<PathBuf>) -> Self {
        Self {
            file,
            workspace_folder,
        }
    }

    /// Value of a single variable, `None` if it is unknown or cannot be
    /// resolved from this context.
    pub fn resolve(&self, variable: &str) -> Option<String> {
        let file = self.file.as_deref();
        let workspace = self.workspace_folder.as_deref();

        match variable {
            "workspaceFolder" => workspace.map(path_string),
            "workspaceFolderBasename" => workspace.and_then(Path::file_name).map(lossy),
            "file" => file.map(path_string),
            "fileBasename" => file.and_then(Path::file_name).map(lossy),
            "fileBasenameNoExtension" => file.and_then(Path::file_stem).map(lossy),
            "fileDirname" => file.and_then(Path::parent).map(path_string),
            "relativeFile" => {
                let (file, workspace) = (file?, workspace?);
                file.strip_prefix(workspace).ok().map(path_string)
            }
            _ => None,
        }
    }

    /// Replace every resolvable `${name}` token in `command`. Tokens that
    /// cannot be resolved are left as written. Substituted values are not
    /// scanned again.
    pub fn expand(&self, command: &str) -> String {
        RE_VARIABLE
            .replace_all(command, |caps: &Captures| {
                self.resolve(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn lossy(name: &std::ffi::OsStr) -> String {
    name.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> DocumentContext {
        DocumentContext::new(
            Some(PathBuf::from("/home/dev/project/docs/setup.md")),
            Some(PathBuf::from("/home/dev/project")),
        )
    }

    #[test]
    fn test_expand_all_variables() {
        let ctx = context();
        assert_eq!(ctx.expand("cd ${workspaceFolder}"), "cd /home/dev/project");
        assert_eq!(ctx.expand("${workspaceFolderBasename}"), "project");
        assert_eq!(ctx.expand("cat ${file}"), "cat /home/dev/project/docs/setup.md");
        assert_eq!(ctx.expand("${fileBasename}"), "setup.md");
        assert_eq!(ctx.expand("${fileBasenameNoExtension}"), "setup");
        assert_eq!(ctx.expand("${fileDirname}"), "/home/dev/project/docs");
        assert_eq!(ctx.expand("${relativeFile}"), "docs/setup.md");
    }

    #[test]
    fn test_multiple_tokens_in_one_command() {
        let ctx = context();
        assert_eq!(
            ctx.expand("pandoc ${file} -o ${fileDirname}/${fileBasenameNoExtension}.pdf"),
            "pandoc /home/dev/project/docs/setup.md -o /home/dev/project/docs/setup.pdf"
        );
    }

    #[test]
    fn test_missing_context_leaves_tokens() {
        let ctx = DocumentContext::default();
        assert_eq!(ctx.expand("ls ${workspaceFolder}"), "ls ${workspaceFolder}");
        assert_eq!(ctx.expand("${relativeFile}"), "${relativeFile}");

        let ctx = DocumentContext::new(Some(PathBuf::from("/tmp/a.txt")), None);
        assert_eq!(ctx.expand("${file} ${relativeFile}"), "/tmp/a.txt ${relativeFile}");
    }

    #[test]
    fn test_file_outside_workspace_has_no_relative_path() {
        let ctx = DocumentContext::new(
            Some(PathBuf::from("/etc/hosts")),
            Some(PathBuf::from("/home/dev/project")),
        );
        assert_eq!(ctx.expand("${relativeFile}"), "${relativeFile}");
    }

    #[test]
    fn test_unknown_variables_and_shell_syntax_untouched() {
        let ctx = context();
        assert_eq!(ctx.expand("echo ${HOME} $PATH"), "echo ${HOME} $PATH");
    }

    #[test]
    fn test_substitution_is_not_recursive() {
        let ctx = DocumentContext::new(
            Some(PathBuf::from("/work/${file}.md")),
            Some(PathBuf::from("/work")),
        );
        assert_eq!(ctx.expand("${file}"), "/work/${file}.md");
    }
}
