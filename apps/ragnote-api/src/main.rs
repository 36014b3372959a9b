use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = ragnote_api::Args::parse();

	ragnote_api::run(args).await
}
