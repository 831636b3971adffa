//! Input template rendering.
//!
//! A template becomes one concrete simulator input by substituting two
//! placeholder families: `@variableK@` with the declared name of variable `K`
//! and `@valueK@` with the candidate's formatted value, `K` one-indexed.

use cal_types::Variable;

/// Render one template against one parameter vector.
///
/// Substitution runs sequentially for `K = 1..=nvariables`, each pass over
/// the previous pass's output, so text produced by an earlier substitution is
/// visible to later ones. The order is part of the contract.
pub fn render(template: &str, variables: &[Variable], row: &[f64]) -> String {
    debug_assert_eq!(variables.len(), row.len());
    let mut text = template.to_string();
    for (index, (variable, value)) in variables.iter().zip(row).enumerate() {
        let k = index + 1;
        text = text.replace(&format!("@variable{k}@"), &variable.name);
        text = text.replace(&format!("@value{k}@"), &variable.format.render(*value));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use cal_types::CFormat;

    fn variable(name: &str, format: &str) -> Variable {
        Variable {
            name: name.into(),
            minimum: 0.0,
            maximum: 10.0,
            format: CFormat::parse(format).unwrap(),
            sweeps: None,
        }
    }

    #[test]
    fn substitutes_name_and_value() {
        let variables = vec![variable("k", "%.1f")];
        assert_eq!(render("@variable1@=@value1@", &variables, &[3.5]), "k=3.5");
    }

    #[test]
    fn rendering_is_repeatable() {
        let variables = vec![variable("k", "%.1f")];
        let first = render("@variable1@=@value1@\n", &variables, &[3.5]);
        let second = render("@variable1@=@value1@\n", &variables, &[3.5]);
        assert_eq!(first, second);
    }

    #[test]
    fn every_occurrence_is_replaced() {
        let variables = vec![variable("k", "%.0f")];
        assert_eq!(
            render("@value1@ @value1@ @value1@", &variables, &[7.0]),
            "7 7 7"
        );
    }

    #[test]
    fn later_passes_see_earlier_output() {
        // Variable 1's label itself names the @value2@ placeholder; pass 2
        // must substitute it because pass 1 ran first.
        let variables = vec![variable("@value2@", "%.0f"), variable("c", "%.1f")];
        assert_eq!(
            render("@variable1@", &variables, &[1.0, 2.5]),
            "2.5"
        );
    }

    #[test]
    fn unknown_placeholders_pass_through() {
        let variables = vec![variable("k", "%.1f")];
        assert_eq!(
            render("@value1@ @value9@ @other@", &variables, &[1.0]),
            "1.0 @value9@ @other@"
        );
    }

    #[test]
    fn two_variables_in_declaration_order() {
        let variables = vec![variable("alpha", "%.2f"), variable("beta", "%le")];
        let rendered = render(
            "@variable1@=@value1@ @variable2@=@value2@",
            &variables,
            &[0.5, 2.0],
        );
        assert_eq!(rendered, "alpha=0.50 beta=2.000000e+00");
    }
}
