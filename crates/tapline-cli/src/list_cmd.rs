//! `tapline list` command: show the scenarios that `tapline run` accepts.

use tapline_core::scenario::ScenarioRegistry;

/// One line per scenario: name, device family, description.
pub fn render_list(registry: &ScenarioRegistry) -> String {
    let width = registry
        .iter()
        .map(|scenario| scenario.name().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for scenario in registry.iter() {
        out.push_str(&format!(
            "{:<width$}  {:<6}  {}\n",
            scenario.name(),
            scenario.device().as_str(),
            scenario.description(),
        ));
    }
    out
}

pub fn run_list(registry: &ScenarioRegistry) {
    if registry.is_empty() {
        println!("No scenarios registered.");
        return;
    }
    print!("{}", render_list(registry));
}
