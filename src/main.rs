use std::process::ExitCode;

use camino::Utf8PathBuf;
use chizu::tasks::{BUILD, WATCH, pipeline};
use chizu::{ChizuError, Environment, Mode, Profile, ProfileName, Website};
use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ProfileArg {
    Development,
    Distribution,
    Online,
}

impl From<ProfileArg> for ProfileName {
    fn from(value: ProfileArg) -> Self {
        match value {
            ProfileArg::Development => ProfileName::Development,
            ProfileArg::Distribution => ProfileName::Distribution,
            ProfileArg::Online => ProfileName::Online,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    /// Task or composite to run, `serve` and `watch` keep running.
    #[clap(index = 1, default_value = BUILD)]
    task: String,

    /// Stock profile, also the base of `--config`.
    #[clap(long, value_enum, default_value = "development")]
    profile: ProfileArg,

    /// JSON file whose sections replace the ones of the profile.
    #[clap(long)]
    config: Option<Utf8PathBuf>,

    /// Project root, every profile path is relative to it.
    #[clap(long, default_value = ".")]
    root: Utf8PathBuf,
}

fn profile(args: &Args) -> anyhow::Result<Profile> {
    let name = args.profile.into();

    match &args.config {
        Some(path) => Profile::from_file(name, path)
            .map_err(|e| anyhow::Error::from(ChizuError::Profile(path.to_string(), e))),
        None => Ok(Profile::named(name)),
    }
}

fn execute(args: Args) -> anyhow::Result<()> {
    let profile = profile(&args)?;
    let website = pipeline(&profile);

    tracing::info!(profile = %profile.name, task = %args.task, "running chizu");

    match args.task.as_str() {
        "serve" => serve(&website, Environment::new(profile, args.root, Mode::Build)),
        WATCH => {
            let env = Environment::new(profile, args.root, Mode::Watch);
            website.watch(WATCH, env)?;
            Ok(())
        }
        task => {
            let env = Environment::new(profile, args.root, Mode::Build);
            let diagnostics = website.run(task, &env)?;
            tracing::debug!("task timings:\n{diagnostics}");
            Ok(())
        }
    }
}

fn serve(website: &Website, env: Environment) -> anyhow::Result<()> {
    if !env.profile.server.enabled {
        anyhow::bail!("the {} profile has no development server", env.profile.name);
    }

    website.serve(&env)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = chizu::init_logging() {
        eprintln!("Couldn't initialize logging: {e}");
    }

    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
