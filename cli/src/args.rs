use anyhow::{bail, Context, Result};
use feedscout_scanner::ScanRequest;

pub const USAGE: &str = "\
Usage: feedscout <query...> [--target N] [--enrich] [--postal CODE]
       feedscout --init-config

Streams one JSON object per line to stdout:
  {\"type\":\"update\",\"data\":{...},\"progress\":N}
  {\"type\":\"complete\",\"totalResults\":N}

Options:
  --target N      Stop after N records (default: unbounded)
  --enrich        Look up a contact email on each record's website
  --postal CODE   Only stream records in this postal code
  --init-config   Write the default configuration file and exit
  -h, --help      Show this message";

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Scan(ScanRequest),
    InitConfig,
    Help,
}

pub fn parse<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut words = Vec::new();
    let mut target = 0;
    let mut enrich = false;
    let mut postal = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--init-config" => return Ok(Command::InitConfig),
            "--enrich" => enrich = true,
            "--target" => {
                let value = args.next().context("--target needs a value")?;
                target = value
                    .parse()
                    .with_context(|| format!("invalid --target value: {value}"))?;
            }
            "--postal" => postal = Some(args.next().context("--postal needs a value")?),
            flag if flag.starts_with("--") => bail!("unknown option: {flag}"),
            _ => words.push(arg),
        }
    }

    let query = words.join(" ");
    if query.trim().is_empty() {
        bail!("missing search query");
    }

    let mut request = ScanRequest::new(query)
        .with_target(target)
        .with_enrichment(enrich);
    if let Some(code) = postal {
        request = request.with_postal_filter(code);
    }
    Ok(Command::Scan(request))
}
