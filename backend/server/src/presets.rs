//! Default texts for new events and the choices offered when boosting.

/// First entry is the empty choice.
pub const BOOST_TYPES: &[&str] = &[
    "---",
    "Awesome sauce",
    "Data wizards",
    "Glorious purpose",
    "Top tutorial",
    "Super committers",
];

pub fn is_valid_boost(choice: &str) -> bool {
    choice != BOOST_TYPES[0] && BOOST_TYPES.contains(&choice)
}

pub const QUICKSTART: &str = "## Quickstart

1. Log in or register an account.
2. Join a project on the event page, or start your own challenge.
3. Post updates to the project log as you go.
4. Fill in the details of your project page before the end of the event.";

pub const CODE_OF_CONDUCT: &str = "## Code of Conduct

All participants are expected to treat each other with respect. Harassment of
any kind is not tolerated. Contact the organizers if something is not right.";

pub const EVENT_START_TIPS: &[&str] = &[
    "Pick a name, a place and dates for your event.",
    "Describe the goals of the hackathon and who should take part.",
    "Invite participants to register and post challenges ahead of time.",
    "Ask an administrator to feature the event on the home page.",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boost_choices() {
        assert!(is_valid_boost("Data wizards"));
        assert!(!is_valid_boost("---"));
        assert!(!is_valid_boost("Something else"));
    }
}
