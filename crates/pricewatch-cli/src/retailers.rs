use pricewatch_core::RetailerConfig;
use pricewatch_scraper::SharedRegistry;

pub(crate) fn run_retailers(registry: &SharedRegistry, lookup: Option<&str>) {
    let snapshot = registry.current();

    if let Some(url) = lookup {
        match snapshot.lookup(url) {
            Some(retailer) => println!("{}", describe(retailer)),
            None => println!("no retailer matches {url}; generic selectors and standard fetch only"),
        }
        return;
    }

    if snapshot.is_empty() {
        println!("no retailers configured");
        return;
    }
    for retailer in snapshot.retailers() {
        println!("{}", describe(retailer));
    }
}

pub(crate) fn describe(retailer: &RetailerConfig) -> String {
    let mut flags = Vec::new();
    if retailer.is_json_backdoor_eligible {
        flags.push("json");
    }
    if retailer.requires_js_rendering {
        flags.push("js");
    }
    if retailer.requires_anti_bot_bypass {
        flags.push("bypass");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    format!("{:<24} {}{flags}", retailer.domain, retailer.name)
}
