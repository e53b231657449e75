use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = dx_agent::Args::parse();

	dx_agent::run(args).await
}
