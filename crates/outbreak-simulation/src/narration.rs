use outbreak_core::Stats;

/// A participant state change worth announcing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Caught the disease.
    Infected,
    /// Death was latched.
    Died,
    /// An active infection was cured.
    Cured,
    /// Gained the healer flag.
    BecameHealer,
}

impl Transition {
    /// The announcement for `name`, quoting the running total from `stats`.
    pub fn message(self, name: &str, stats: &Stats) -> String {
        match self {
            Transition::Infected => format!("{name} has been infected. {} infected so far...", stats.infected),
            Transition::Died => format!("\u{1F480} {name} has died. {} dead so far.", stats.dead),
            Transition::Cured => format!("{name} has been cured! Amazing. {} cured so far.", stats.cured),
            Transition::BecameHealer => format!(
                "{name} is now a healer...? Wonder what that means. Rather rare, only {} of them.",
                stats.healers
            ),
        }
    }
}

/// `a`, `a and b`, `a, b and c`.
pub fn human_join(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// Announcement for newly infected recruits.
pub fn recruits_infected(names: &[String]) -> String {
    format!("{} are suddenly infected.", human_join(names))
}

/// Announcement for new healer recruits.
pub fn recruits_healers(names: &[String]) -> String {
    format!("{} are suddenly healers...?", human_join(names))
}

/// A game master announcement.
pub fn announcement(text: &str) -> String {
    format!("\u{1F4E3} {text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn joins_names() {
        assert_eq!(human_join(&[]), "");
        assert_eq!(human_join(&names(&["ann"])), "ann");
        assert_eq!(human_join(&names(&["ann", "bo"])), "ann and bo");
        assert_eq!(human_join(&names(&["ann", "bo", "cy"])), "ann, bo and cy");
    }

    #[test]
    fn messages_quote_totals() {
        let stats = Stats {
            infected: 7,
            healers: 2,
            dead: 3,
            cured: 1,
        };
        assert_eq!(Transition::Died.message("ann", &stats), "\u{1F480} ann has died. 3 dead so far.");
        assert!(Transition::Infected.message("bo", &stats).contains("7 infected"));
        assert!(Transition::BecameHealer.message("cy", &stats).ends_with("only 2 of them."));
        assert_eq!(recruits_infected(&names(&["a", "b"])), "a and b are suddenly infected.");
    }
}
