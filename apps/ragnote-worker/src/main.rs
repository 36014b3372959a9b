use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	ragnote_worker::run(ragnote_worker::Args::parse()).await
}
