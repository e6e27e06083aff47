use anyhow::{bail, Context};
use clap::Parser;
use serde_json::json;
use spore::cli::{Cli, Commands, ConfigAction};
use spore::config::CONFIG_KEYS;
use spore::inject::ClobberPolicy;
use spore::Spore;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    spore::logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Get(opts) => {
            let spore = Spore::bootstrap()?;
            spore.authenticate()?;
            let dir = project_dir(opts.dir)?;
            let mut app = spore.load_app(&dir).await?;
            match opts.key {
                Some(key) => println!("{}", app.value(&opts.env, &key).await?),
                None => {
                    for (key, value) in app.values(&opts.env).await? {
                        println!("{key}={value}");
                    }
                }
            }
        }
        Commands::Load(opts) => {
            let spore = Spore::bootstrap()?;
            spore.authenticate()?;
            let dir = project_dir(opts.dir)?;
            let overlay = spore.load_env(&dir, opts.env.as_deref()).await?;
            print!("{}", overlay.export_lines(policy(opts.overwrite)));
        }
        Commands::Run(opts) => {
            let spore = Spore::bootstrap()?;
            spore.authenticate()?;
            let dir = project_dir(opts.dir)?;
            let overlay = spore.load_env(&dir, opts.env.as_deref()).await?;

            let (program, args) = opts
                .command
                .split_first()
                .context("no command given after `--`")?;
            info!("Running {program} with the {} environment", overlay.env_name());

            let mut command = tokio::process::Command::new(program);
            command.args(args);
            overlay.apply_to_command(&mut command, policy(opts.overwrite));
            let status = command.status().await?;
            std::process::exit(status.code().unwrap_or(1));
        }
        Commands::Init(opts) => {
            let spore = Spore::bootstrap()?;
            let dir = project_dir(opts.dir)?;
            let path = dir.join(spore.config().spore_file()?);
            if path.exists() {
                bail!("{} already exists", path.display());
            }

            let name = match opts.name {
                Some(name) => name,
                None => dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("cannot derive an app name from the directory")?,
            };
            let envs: serde_json::Map<String, serde_json::Value> = spore
                .config()
                .default_envs()?
                .into_iter()
                .map(|env| (env, json!({})))
                .collect();
            let manifest = json!({
                "name": name,
                "id": uuid::Uuid::new_v4().to_string(),
                "envs": envs,
            });
            std::fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
            info!("Created {}", path.display());
        }
        Commands::Config(opts) => {
            let mut spore = Spore::bootstrap()?;
            match opts.action {
                ConfigAction::Show => {
                    let mut settings = serde_json::Map::new();
                    for key in CONFIG_KEYS {
                        settings.insert((*key).to_string(), spore.config().get(key)?);
                    }
                    println!("{}", serde_json::to_string_pretty(&settings)?);
                }
                ConfigAction::Set { key, value } => {
                    if spore.config().is_deployment() {
                        bail!("deployment configuration is read-only");
                    }
                    spore
                        .config_mut()
                        .set(&key, serde_json::Value::String(value))?;
                    spore.config().save()?;
                    info!("Set {key}");
                }
            }
        }
    }

    Ok(())
}

fn project_dir(dir: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => Ok(std::env::current_dir()?),
    }
}

fn policy(overwrite: bool) -> ClobberPolicy {
    if overwrite {
        ClobberPolicy::Overwrite
    } else {
        ClobberPolicy::Preserve
    }
}
