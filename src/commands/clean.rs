use crate::{CleanArgs, site::Verb};

use super::open_site;

pub async fn run(args: &CleanArgs) -> Result<(), anyhow::Error> {
    let site = open_site(&args.project, Verb::Unknown)?;
    let build_root = site.build_root();

    if build_root.exists() {
        site.clean()?;
        println!("Deleted {}", build_root.display());
    }

    Ok(())
}
