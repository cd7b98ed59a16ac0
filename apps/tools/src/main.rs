use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use shared::protocol::{Reply, STATUS_ERROR};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:7878")]
    addr: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one request to a running server and print the reply.
    Send {
        cmd: String,
        /// Operation-specific parameters as a JSON object.
        #[arg(long)]
        opts: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Send { cmd, opts } => {
            let mut request = json!({ "cmd": cmd });
            if let Some(raw) = opts {
                let opts: Value =
                    serde_json::from_str(&raw).context("--opts is not valid JSON")?;
                if !opts.is_object() {
                    bail!("--opts must be a JSON object");
                }
                request["opts"] = opts;
            }

            let stream = TcpStream::connect(&cli.addr)
                .await
                .with_context(|| format!("failed to connect to {}", cli.addr))?;
            let (reader, mut writer) = stream.into_split();

            let mut line = serde_json::to_string(&request)?;
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;

            let mut reply_line = String::new();
            BufReader::new(reader).read_line(&mut reply_line).await?;
            let reply: Reply = serde_json::from_str(reply_line.trim())
                .context("server returned an unparseable reply")?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
            if reply.status == STATUS_ERROR {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
