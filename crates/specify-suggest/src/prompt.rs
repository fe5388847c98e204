use specify_core::profile::Domain;

pub fn system_prompt() -> String {
    let domains: Vec<&str> = Domain::ALL.iter().map(|d| d.tag()).collect();
    format!(
        "You read a short description of a software product and extract the facts a backend \
architect needs. Report only what the description states or clearly implies. Leave a field null \
when the description is silent; defaults are applied later and logged as assumptions.\n\n\
Output ONLY one JSON object with these keys:\n\
- \"projectName\": the product name if one is given, else null\n\
- \"domain\": one of {domains} or null\n\
- \"primaryAction\": the main thing users do, as a short verb phrase (\"book appointments\"), or null\n\
- \"entities\": the nouns the system stores, singular (\"Appointment\", \"Doctor\"); [] if none are named\n\
- \"techPreferences\": technologies the description asks for by name (\"PostgreSQL\", \"Kafka\"); [] if none\n\
- \"scaleUsers\": the expected number of users as an integer, or null\n\
- \"realTime\": true if live updates, chat or notifications are required, false if explicitly \
ruled out, else null\n\
- \"sensitiveData\": true if payments, bank details, health records or similar are stored, false if \
explicitly ruled out, else null\n\n\
The resulting document follows these rules:\n{rules}\n\n\
Output ONLY the JSON object, nothing else.",
        domains = domains.join(", "),
        rules = specify_core::rules::RULES,
    )
}

pub fn user_message(description: &str) -> String {
    format!("Product description:\n\"\"\"\n{}\n\"\"\"", description.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_names_every_key_and_domain() {
        let prompt = system_prompt();
        for key in [
            "domain",
            "primaryAction",
            "entities",
            "techPreferences",
            "scaleUsers",
            "realTime",
            "sensitiveData",
        ] {
            assert!(prompt.contains(&format!("\"{key}\"")), "missing {key}");
        }
        assert!(prompt.contains("fintech, healthcare, ecommerce"));
    }

    #[test]
    fn user_message_fences_the_description() {
        assert_eq!(user_message("  a blog \n"), "Product description:\n\"\"\"\na blog\n\"\"\"");
    }
}
