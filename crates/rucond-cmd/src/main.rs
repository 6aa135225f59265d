use std::{net::IpAddr, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rucond::{net::Destination, route::RoutingContext, user::MemoryUser};
use rucondimp::{
    route::{
        gfw::{GfwList, GfwMatcher},
        RuleRouter,
    },
    utils::try_get_file_content,
};
use tracing::{debug, info};

/// rucond command line
#[derive(Parser)]
#[command(author = "e")]
#[command(version, about, long_about = None)]
struct Args {
    /// used when RUST_LOG is not set
    #[arg(short, long, default_value_t = tracing::Level::INFO)]
    log_level: tracing::Level,

    #[command(subcommand)]
    sub_cmds: SubCommands,
}

#[derive(Subcommand)]
enum SubCommands {
    /// pick the out tag of a connection by the rules in a toml config
    Check {
        #[arg(short, long, value_name = "FILE", default_value = "route.toml")]
        config: String,

        /// like tcp://www.google.com:443
        #[arg(short, long)]
        target: Option<String>,

        /// like tcp://192.168.1.2:5000
        #[arg(short, long)]
        source: Option<String>,

        /// resolved ip of the target domain, can be repeated
        #[arg(long)]
        ip: Vec<IpAddr>,

        /// email of the authenticated user
        #[arg(short, long)]
        user: Option<String>,

        #[arg(short, long)]
        inbound_tag: Option<String>,
    },

    /// check domains against a gfwlist file (plain or base64)
    Gfw {
        #[arg(short, long, value_name = "FILE", default_value = "gfwlist.txt")]
        list: String,

        domains: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_log(args.log_level);
    info!("version: rucond-cmd: rucondimp_{}", rucondimp::VERSION);

    match args.sub_cmds {
        SubCommands::Check {
            config,
            target,
            source,
            ip,
            user,
            inbound_tag,
        } => {
            let router = RuleRouter::load(&config)?;
            debug!(rules = router.len(), "loaded {config}");

            let mut ctx = RoutingContext::default();
            if let Some(t) = target {
                ctx = ctx.with_target(
                    Destination::from_network_addr_url(&t).with_context(|| format!("target {t}"))?,
                );
            }
            if let Some(s) = source {
                ctx = ctx.with_source(
                    Destination::from_network_addr_url(&s).with_context(|| format!("source {s}"))?,
                );
            }
            if !ip.is_empty() {
                ctx = ctx.with_resolved_ips(ip);
            }
            if let Some(u) = user {
                ctx = ctx.with_user(Box::new(MemoryUser::new(u)));
            }
            if let Some(tag) = inbound_tag {
                ctx = ctx.with_inbound_tag(tag);
            }

            match router.pick(&ctx) {
                Some(tag) => println!("{tag}"),
                None => println!("(default)"),
            }
        }
        SubCommands::Gfw { list, domains } => {
            let (text, path) = try_get_file_content(&list)?;
            debug!("gfwlist found at {:?}", path);

            let l = Arc::new(GfwList::parse_source(&text));
            info!(fast = l.fast_len(), slow = l.slow_len(), "gfwlist loaded");

            let m = GfwMatcher::new(l);
            for d in domains {
                let d = d.to_lowercase();
                let blocked = m.is_blocked(&d);
                println!("{d}: {}", if blocked { "blocked" } else { "not blocked" });
            }
        }
    }
    Ok(())
}

fn init_log(level: tracing::Level) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
