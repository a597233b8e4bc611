use crate::{BuildArgs, site::Verb};

use super::site_builder;

pub async fn run(args: &BuildArgs) -> Result<(), anyhow::Error> {
    let site = site_builder(&args.project, Verb::Build)?
        .with_parallel(args.parallel)
        .build()?;
    site.build()?;

    println!(
        "Built {} pages, {} static files into {}",
        site.pages()?.len(),
        site.static_files()?.len(),
        site.build_root().display()
    );

    Ok(())
}
