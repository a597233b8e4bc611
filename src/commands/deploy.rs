use crate::{
    DeployArgs,
    site::{Outcome, Verb},
};

use super::site_builder;

pub async fn run(args: &DeployArgs) -> Result<(), anyhow::Error> {
    let site = site_builder(&args.project, Verb::Build)?
        .with_parallel(args.parallel)
        .build()?;

    match site.upload()? {
        Outcome::Offline => {
            println!("There does not seem to be internet here, check your connection");
        }
        Outcome::Done(summary) => {
            println!("\nDone\n\n{summary}");
            if let Some(url) = site.url() {
                println!("\n{url}");
            }
        }
    }

    Ok(())
}
