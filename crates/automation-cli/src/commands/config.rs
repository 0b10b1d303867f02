use std::io::{BufRead, Write};

use anyhow::{bail, Context as _};
use automation_core::fields::{get_field, set_field};
use automation_core::Environment;
use tracing::info;

use crate::context::Context;

/// Values for `config setup`; anything missing is prompted for.
#[derive(Debug, Clone, Default)]
pub struct SetupValues {
    pub chain_id: Option<u64>,
    pub http_url: Option<String>,
    pub ws_url: Option<String>,
    pub key_alias: Option<String>,
}

/// Ask for `label`, offering `current` as the default answer.
fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    current: &str,
) -> anyhow::Result<String> {
    if current.is_empty() {
        write!(output, "{label}: ")?;
    } else {
        write!(output, "{label} [{current}]: ")?;
    }
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("no value for {label}: input closed");
    }
    let answer = line.trim();
    Ok(if answer.is_empty() {
        current.to_string()
    } else {
        answer.to_string()
    })
}

pub fn setup(ctx: &Context, values: SetupValues) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    let env = setup_with(ctx, values, &mut input, &mut output)?;
    println!(
        "environment {} saved (chain {})",
        ctx.environment_name(),
        env.chain_id
    );
    Ok(())
}

/// `config setup` against explicit input and output streams.
pub fn setup_with<R: BufRead, W: Write>(
    ctx: &Context,
    values: SetupValues,
    input: &mut R,
    output: &mut W,
) -> anyhow::Result<Environment> {
    let mut env = ctx.load_environment()?;

    env.chain_id = match values.chain_id {
        Some(id) => id,
        None => {
            let current = if env.chain_id == 0 {
                String::new()
            } else {
                env.chain_id.to_string()
            };
            let raw = prompt(input, output, "chain id", &current)?;
            raw.parse()
                .with_context(|| format!("chain id {raw:?} is not a number"))?
        }
    };
    env.http_url = match values.http_url {
        Some(url) => url,
        None => prompt(input, output, "HTTP RPC URL", &env.http_url)?,
    };
    env.ws_url = match values.ws_url {
        Some(url) => url,
        None => prompt(input, output, "WebSocket RPC URL", &env.ws_url)?,
    };
    env.private_key_alias = match values.key_alias {
        Some(alias) => alias,
        None => prompt(input, output, "private key alias", &env.private_key_alias)?,
    };

    ctx.save_environment(&env)?;
    info!(environment = %ctx.environment_name(), chain_id = env.chain_id, "environment configured");
    Ok(env)
}

pub fn delete(ctx: &Context) -> anyhow::Result<()> {
    let existed = ctx
        .store()
        .delete_environment(ctx.environment_name())
        .with_context(|| format!("deleting environment {}", ctx.environment_name()))?;
    if existed {
        println!("environment {} deleted", ctx.environment_name());
    } else {
        println!("environment {} does not exist", ctx.environment_name());
    }
    Ok(())
}

pub fn set(ctx: &Context, key: &str, value: &str) -> anyhow::Result<()> {
    let env = ctx.load_environment()?;
    let updated = set_field(&env, key, value)?;
    ctx.save_environment(&updated)?;
    info!(%key, %value, "config updated");
    Ok(())
}

pub fn get(ctx: &Context, key: &str) -> anyhow::Result<String> {
    let env = ctx.load_environment()?;
    Ok(get_field(&env, key)?)
}
