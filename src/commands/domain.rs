use crate::{
    DomainAction, DomainArgs,
    site::{Outcome, Verb},
};

use super::open_site;

pub async fn run(args: &DomainArgs) -> Result<(), anyhow::Error> {
    let site = open_site(&args.project, Verb::Unknown)?;

    let domains = match args.action {
        DomainAction::Setup => match site.domain_setup()? {
            Outcome::Offline => {
                println!("There does not seem to be internet here, check your connection");
                return Ok(());
            }
            Outcome::Done(domains) => domains,
        },
        DomainAction::List => site.domain_list()?,
    };

    if domains.is_empty() {
        println!("No domains configured");
    }
    for domain in domains {
        println!("{domain}");
    }

    Ok(())
}
