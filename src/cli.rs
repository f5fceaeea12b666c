use std::process::exit;

pub struct Command {
    pub workspace: String,
    pub options: Options,
}

#[derive(Clone, Debug, Default)]
pub struct Options {
    pub list_identifiers: bool,
    pub list_unused: bool,
}

impl Command {
    pub fn parse_env_args() -> Result<Self, ()> {
        let mut args = std::env::args().skip(1).peekable();

        match args.peek().map(|arg| arg.as_str()) {
            None | Some("-h") | Some("--help") => {
                show_help();
                exit(0);
            }
            _ => (),
        }

        let mut workspace = None;
        let mut options = Options::default();

        for arg in args {
            if arg == "--list" {
                options.list_identifiers = true;
            } else if arg == "--unused" {
                options.list_unused = true;
            } else if arg.starts_with('-') {
                eprintln!("error: unknown option {}", arg);
                return Err(());
            } else if workspace.is_some() {
                eprintln!("error: multiple workspace files specified");
                return Err(());
            } else {
                workspace = Some(arg);
            }
        }

        let Some(workspace) = workspace else {
            eprintln!("error: no workspace file specified");
            return Err(());
        };

        Ok(Self { workspace, options })
    }
}

fn show_help() {
    println!("usage: idlink [--list] [--unused] WORKSPACE.json");
    println!();
    println!("  --list    print the identifier table after analysis");
    println!("  --unused  print identifiers with a single occurrence");
}
