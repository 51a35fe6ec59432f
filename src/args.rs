use std::path::PathBuf;
use std::str::FromStr;
use structopt::{clap::AppSettings::ColoredHelp, StructOpt};

use crate::contracts::{self, FetchOutcome, PageRevision};
use crate::error::{Error, Result};

#[derive(StructOpt, Debug)]
#[structopt(name = "wikitext-tools", setting(ColoredHelp))]
struct Args {
    #[structopt(long, short)]
    verbose: bool,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    #[structopt(name = "tags", setting(ColoredHelp))]
    /// list HTML-like tags and comments found in a page
    Tags {
        #[structopt(long)]
        /// only report tags missing their end tag
        unclosed_only: bool,
        #[structopt(flatten)]
        page_args: PageArgs,
        #[structopt(flatten)]
        output_args: OutputArgs,
    },
    #[structopt(name = "parameters", setting(ColoredHelp))]
    /// list {{{parameter}}} placeholders found in a page
    Parameters {
        #[structopt(long)]
        /// skip placeholders nested inside another placeholder
        top_level_only: bool,
        #[structopt(flatten)]
        page_args: PageArgs,
        #[structopt(flatten)]
        output_args: OutputArgs,
    },
    #[structopt(name = "sections", setting(ColoredHelp))]
    /// list heading-delimited sections of a page
    Sections {
        #[structopt(flatten)]
        page_args: PageArgs,
        #[structopt(flatten)]
        output_args: OutputArgs,
    },
    #[structopt(name = "templates", setting(ColoredHelp))]
    /// list template transclusions found in a page
    Templates {
        #[structopt(long = "name", short)]
        /// template name to keep, repeatable; all templates when absent
        names: Vec<String>,
        #[structopt(flatten)]
        page_args: PageArgs,
        #[structopt(flatten)]
        output_args: OutputArgs,
    },
    #[structopt(name = "close_tags", setting(ColoredHelp))]
    /// append the end tags malformed markup left out and print the page
    CloseTags {
        #[structopt(long, short)]
        /// write the result here instead of standard output
        output_filepath: Option<PathBuf>,
        #[structopt(flatten)]
        page_args: PageArgs,
    },
    #[structopt(name = "rename_template", setting(ColoredHelp))]
    /// retarget transclusions of one template and emit an edit request
    RenameTemplate {
        #[structopt(long)]
        from: String,
        #[structopt(long)]
        to: String,
        #[structopt(long, short)]
        /// edit summary [default: generated from the names]
        summary: Option<String>,
        #[structopt(long)]
        /// page title for the edit request [default: the file name]
        title: Option<String>,
        #[structopt(flatten)]
        page_args: PageArgs,
    },
}

#[derive(StructOpt, Debug)]
struct PageArgs {
    /// path to a file containing page wikitext
    #[structopt(long = "input", short = "i")]
    page_filepath: PathBuf,
}

#[derive(StructOpt, Debug, Clone)]
pub struct OutputArgs {
    #[structopt(long, short = "P")]
    /// print pretty JSON
    pub pretty: bool,
    #[structopt(long, default_value = "json")]
    /// output format, json or cbor
    pub format: SerializationFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum SerializationFormat {
    Json,
    Cbor,
}

impl FromStr for SerializationFormat {
    type Err = String;

    fn from_str(format: &str) -> std::result::Result<Self, Self::Err> {
        match format {
            "json" => Ok(SerializationFormat::Json),
            "cbor" => Ok(SerializationFormat::Cbor),
            other => Err(format!("unknown serialization format {:?}", other)),
        }
    }
}

#[derive(Debug)]
pub struct Opts {
    pub verbose: bool,
    pub cmd: CommandData,
}

#[derive(Debug)]
pub struct PageInput {
    pub path: PathBuf,
    pub revision: PageRevision,
}

#[derive(Debug)]
pub enum CommandData {
    Tags {
        unclosed_only: bool,
        page: PageInput,
        output: OutputArgs,
    },
    Parameters {
        top_level_only: bool,
        page: PageInput,
        output: OutputArgs,
    },
    Sections {
        page: PageInput,
        output: OutputArgs,
    },
    Templates {
        names: Vec<String>,
        page: PageInput,
        output: OutputArgs,
    },
    CloseTags {
        output_filepath: Option<PathBuf>,
        page: PageInput,
    },
    RenameTemplate {
        from: String,
        to: String,
        summary: Option<String>,
        title: Option<String>,
        page: PageInput,
    },
}

fn fetch_page(page_args: PageArgs) -> Result<PageInput> {
    let path = page_args.page_filepath;
    match contracts::fetch_page_file(&path) {
        FetchOutcome::Fetched(revision) => Ok(PageInput { path, revision }),
        FetchOutcome::Missing => Err(Error::PageMissing { path }),
        FetchOutcome::Failed(reason) => Err(Error::FetchFailed { path, reason }),
    }
}

pub fn get_opts() -> Result<Opts> {
    let Args { verbose, cmd } = Args::from_args();
    let cmd = match cmd {
        Command::Tags { unclosed_only, page_args, output_args } => CommandData::Tags {
            unclosed_only,
            page: fetch_page(page_args)?,
            output: output_args,
        },
        Command::Parameters { top_level_only, page_args, output_args } => {
            CommandData::Parameters {
                top_level_only,
                page: fetch_page(page_args)?,
                output: output_args,
            }
        }
        Command::Sections { page_args, output_args } => CommandData::Sections {
            page: fetch_page(page_args)?,
            output: output_args,
        },
        Command::Templates { names, page_args, output_args } => CommandData::Templates {
            names,
            page: fetch_page(page_args)?,
            output: output_args,
        },
        Command::CloseTags { output_filepath, page_args } => CommandData::CloseTags {
            output_filepath,
            page: fetch_page(page_args)?,
        },
        Command::RenameTemplate { from, to, summary, title, page_args } => {
            CommandData::RenameTemplate {
                from,
                to,
                summary,
                title,
                page: fetch_page(page_args)?,
            }
        }
    };
    Ok(Opts { verbose, cmd })
}
