use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::Command,
};

use clap::Args;

/// The external program and where the fake path goes on its command line.
#[derive(Args, Debug, PartialEq)]
pub struct ProgramArgs {
    /// Text in the program's arguments replaced by the fake path. The path is appended as the
    /// last argument when no argument contains it.
    #[clap(long, default_value = "{}", help_heading = "Program")]
    pub(crate) placeholder: String,

    /// The program to run, followed by its arguments.
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "PROGRAM"
    )]
    pub(crate) command: Vec<OsString>,
}

impl ProgramArgs {
    pub fn name(&self) -> String {
        self.command
            .first()
            .map(|program| program.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn arguments(&self, path: &Path) -> Vec<OsString> {
        let mut substituted = false;
        let mut arguments: Vec<OsString> = self
            .command
            .iter()
            .skip(1)
            .map(|argument| match argument.to_str() {
                Some(text) if !self.placeholder.is_empty() && text.contains(&self.placeholder) => {
                    substituted = true;
                    substitute(text, &self.placeholder, path.as_os_str())
                }
                _ => argument.clone(),
            })
            .collect();

        if !substituted {
            arguments.push(path.as_os_str().to_owned());
        }

        arguments
    }

    pub fn command(&self, path: &Path) -> Command {
        let mut command = Command::new(self.command.first().map(OsString::as_os_str).unwrap_or_default());
        command.args(self.arguments(path));
        command
    }
}

fn substitute(text: &str, placeholder: &str, path: &OsStr) -> OsString {
    let mut result = OsString::new();
    let mut pieces = text.split(placeholder);

    if let Some(first) = pieces.next() {
        result.push(first);
    }

    for piece in pieces {
        result.push(path);
        result.push(piece);
    }

    result
}

#[cfg(test)]
pub(crate) fn shell(placeholder: &str, script: &str, extra: &[&str]) -> ProgramArgs {
    let mut command: Vec<OsString> = ["sh", "-c", script, "sh"].map(OsString::from).into();
    command.extend(extra.iter().map(OsString::from));

    ProgramArgs {
        placeholder: placeholder.to_string(),
        command,
    }
}

#[cfg(test)]
mod test {
    use std::{ffi::OsString, path::Path};

    use super::ProgramArgs;

    fn program(placeholder: &str, command: &[&str]) -> ProgramArgs {
        ProgramArgs {
            placeholder: placeholder.to_string(),
            command: command.iter().map(OsString::from).collect(),
        }
    }

    #[test]
    fn placeholder_is_replaced() {
        let args = program("{}", &["convert", "{}", "out.png"]);

        assert_eq!(
            vec![OsString::from("/proc/1/fd/3"), OsString::from("out.png")],
            args.arguments(Path::new("/proc/1/fd/3"))
        );
    }

    #[test]
    fn placeholder_inside_an_argument_is_replaced() {
        let args = program("@", &["tool", "--input=@", "--also=@"]);

        assert_eq!(
            vec![
                OsString::from("--input=/tmp/x"),
                OsString::from("--also=/tmp/x")
            ],
            args.arguments(Path::new("/tmp/x"))
        );
    }

    #[test]
    fn path_is_appended_without_placeholder() {
        let args = program("{}", &["cat", "-n"]);

        assert_eq!(
            vec![OsString::from("-n"), OsString::from("/tmp/x")],
            args.arguments(Path::new("/tmp/x"))
        );
        assert_eq!("cat", args.name());
    }
}
