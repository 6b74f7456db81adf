use std::fmt;

use serde::{Deserialize, Serialize};

/// One external command as written in a recipe: a program and its arguments.
///
/// Recipes may write a command either as a table (`{ program = "make", args = ["install"] }`)
/// or as a plain array whose first element is the program (`["make", "install"]`).
/// Arguments may contain placeholders such as `{prefix}`; expansion happens at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCommand")]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCommand {
    Table {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Argv(Vec<String>),
}

impl TryFrom<RawCommand> for CommandSpec {
    type Error = String;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        let (program, args) = match raw {
            RawCommand::Table { program, args } => (program, args),
            RawCommand::Argv(mut argv) => {
                if argv.is_empty() {
                    return Err("command array must not be empty".to_string());
                }
                let program = argv.remove(0);
                (program, argv)
            }
        };
        if program.trim().is_empty() {
            return Err("command program must not be empty".to_string());
        }
        Ok(Self { program, args })
    }
}
