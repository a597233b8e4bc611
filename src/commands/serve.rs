use crate::{
    ServeArgs,
    site::{ServeOptions, Verb},
};

use super::open_site;

pub async fn run(args: &ServeArgs) -> Result<(), anyhow::Error> {
    let site = open_site(&args.project, Verb::Serve)?;

    let options = ServeOptions {
        bind: args.bind.clone(),
        port: args.port,
        open: args.open,
    };
    site.serve(options).await?;

    Ok(())
}
