use log::LevelFilter;
use serde::Serialize;
use std::io;

use wikitext_parser::{
    NameStyle, ParseTemplatesConfig, RenderOptions, ReplaceOptions, Template, Wikitext,
};

mod args;
use args::{CommandData, OutputArgs, PageInput, SerializationFormat};

mod contracts;
use contracts::EditRequest;

mod error;
use error::{Error, Result};

fn do_dumping<S>(value: &S, output: &OutputArgs) -> Result<()>
where
    S: Serialize,
{
    match output.format {
        SerializationFormat::Json => {
            if output.pretty {
                serde_json::to_writer_pretty(io::stdout().lock(), value)?;
            } else {
                serde_json::to_writer(io::stdout().lock(), value)?;
            }
            println!();
        }
        SerializationFormat::Cbor => serde_cbor::to_writer(io::stdout().lock(), value)?,
    }
    Ok(())
}

// Normalizes a user-supplied template name the same way parsed targets
// are normalized, so "foo", "Template:foo" and "template:Foo" all hit the
// same transclusions.
fn normalize_target(name: &str) -> Result<String> {
    Ok(Template::new(name)?.clean_name())
}

fn dump_templates(page: PageInput, names: Vec<String>, output: &OutputArgs) -> Result<()> {
    let targets = names
        .into_iter()
        .map(|n| normalize_target(&n))
        .collect::<Result<Vec<_>>>()?;
    let mut options = ParseTemplatesConfig::default();
    if !targets.is_empty() {
        options.name_predicate = Some(Box::new(move |clean: &str| {
            targets.iter().any(|t| t == clean)
        }));
    }
    let mut doc = Wikitext::new(page.revision.content);
    let mut templates = doc.parse_templates(&options);
    templates.sort_by_key(|t| t.span().map(|(start, _)| start));
    eprintln!("{}: {} transclusion(s)", page.path.display(), templates.len());
    do_dumping(&templates, output)
}

fn rename_template(
    page: PageInput,
    from: &str,
    to: &str,
    summary: Option<String>,
    title: Option<String>,
) -> Result<()> {
    let target = normalize_target(from)?;
    let path = page.path;
    let mut doc = Wikitext::new(page.revision.content);
    let mut templates = doc.parse_templates(&ParseTemplatesConfig::default());
    templates.retain(|t| t.clean_name() == target);
    if templates.is_empty() {
        return Err(Error::NoMatchingTemplates { name: from.to_string() });
    }
    // Work back to front so the untouched spans ahead of each edit stay
    // valid for index verification.
    templates.sort_by_key(|t| std::cmp::Reverse(t.span().map(|(start, _)| start)));
    let mut text = doc.text().to_string();
    let mut renamed = 0;
    for mut template in templates {
        template.set_name(to)?;
        let replaced = template.replace_in(
            &text,
            &ReplaceOptions {
                render: RenderOptions { name_style: NameStyle::Full, ..Default::default() },
                ..Default::default()
            },
        );
        if replaced != text {
            renamed += 1;
            text = replaced;
        }
    }
    eprintln!("renamed {} transclusion(s) of {}", renamed, target);
    let request = EditRequest {
        title: title.unwrap_or_else(|| {
            path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        }),
        text,
        summary: summary.unwrap_or_else(|| format!("Replacing {} with {}", from, to)),
        minor: false,
        bot: true,
        base_timestamp: page.revision.base_timestamp,
        start_timestamp: page.revision.cur_timestamp,
    };
    serde_json::to_writer_pretty(io::stdout().lock(), &request)?;
    println!();
    Ok(())
}

fn try_main() -> Result<()> {
    let opts = args::get_opts()?;
    env_logger::Builder::from_default_env()
        .filter(
            None,
            if opts.verbose { LevelFilter::Debug } else { LevelFilter::Warn },
        )
        .init();
    match opts.cmd {
        CommandData::Tags { unclosed_only, page, output } => {
            let mut doc = Wikitext::new(page.revision.content);
            let tags = if unclosed_only {
                doc.tags_where(|t| t.unclosed)
            } else {
                doc.parse_tags()
            };
            eprintln!("{}: {} tag(s)", page.path.display(), tags.len());
            do_dumping(&tags, &output)?;
        }
        CommandData::Parameters { top_level_only, page, output } => {
            let mut doc = Wikitext::new(page.revision.content);
            let parameters = doc.parse_parameters(!top_level_only);
            eprintln!("{}: {} parameter(s)", page.path.display(), parameters.len());
            do_dumping(&parameters, &output)?;
        }
        CommandData::Sections { page, output } => {
            let mut doc = Wikitext::new(page.revision.content);
            let sections = doc.parse_sections();
            eprintln!("{}: {} section(s)", page.path.display(), sections.len());
            do_dumping(&sections, &output)?;
        }
        CommandData::Templates { names, page, output } => {
            dump_templates(page, names, &output)?;
        }
        CommandData::CloseTags { output_filepath, page } => {
            let mut doc = Wikitext::new(page.revision.content);
            let closed = doc.close_unclosed_tags();
            match output_filepath {
                Some(path) => {
                    std::fs::write(&path, closed).map_err(|e| Error::IoError {
                        action: "write",
                        path,
                        cause: e,
                    })?;
                }
                None => println!("{}", closed),
            }
        }
        CommandData::RenameTemplate { from, to, summary, title, page } => {
            rename_template(page, &from, &to, summary, title)?;
        }
    }
    Ok(())
}

fn main() {
    try_main().unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });
}
