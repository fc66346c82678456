use crate::core::{
    BreakevenResult, BreakevenTarget, ProjectResult, ScheduleColumn, SimulationParameters,
};

const YEAR_HEADER: &str = "Year";

/// Plain-text annual schedule, column totals and NPV.
pub fn render_schedule(params: &SimulationParameters, result: &ProjectResult) -> String {
    let header: Vec<String> = std::iter::once(YEAR_HEADER.to_string())
        .chain(ScheduleColumn::ALL.iter().map(|c| c.label().to_string()))
        .collect();
    let rows: Vec<Vec<String>> = result
        .years
        .iter()
        .map(|record| {
            std::iter::once(record.year.to_string())
                .chain(
                    ScheduleColumn::ALL
                        .iter()
                        .map(|&c| format!("{:.2}", record.value(c))),
                )
                .collect()
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|idx| {
            rows.iter()
                .map(|row| row[idx].len())
                .chain(std::iter::once(header[idx].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    push_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }

    out.push('\n');
    let totals = result.totals();
    for column in ScheduleColumn::ALL {
        out.push_str(&format!(
            "Total {} = {}\n",
            column.label(),
            format_grouped(totals.get(column), 1)
        ));
    }
    out.push_str(&format!(
        "Total recoverable reserves = {} barrels\n",
        format_grouped(params.total_recoverable_reserves, 1)
    ));
    out.push_str(&format!(
        "Calculated NPV: ${}\n",
        format_grouped(result.npv, 2)
    ));
    out
}

pub fn render_breakeven(result: &BreakevenResult, base_npv: f64) -> String {
    let (name, decimals) = match result.target {
        BreakevenTarget::OilPrice => ("Breakeven oil price (USD/barrel)", 2),
        BreakevenTarget::DiscountRate => ("Internal rate of return", 6),
    };

    let solved = result
        .solved_value
        .map(|value| format_grouped(value, decimals))
        .unwrap_or_else(|| "not found".to_string());

    let mut out = String::new();
    out.push_str(&format!("Base case NPV: ${}\n", format_grouped(base_npv, 2)));
    out.push_str(&format!("{name}: {solved}\n"));
    out.push_str(&format!(
        "Iterations: {} (converged: {})\n",
        result.iterations.len(),
        result.converged
    ));
    out.push_str(&result.message);
    out.push('\n');
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:>width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Formats with comma thousands separators, e.g. `1,234,567.9`.
fn format_grouped(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let raw = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (raw.as_str(), None),
    };

    let mut grouped = String::with_capacity(raw.len() + int_part.len() / 3 + 1);
    let is_zero = raw.chars().all(|c| c == '0' || c == '.');
    if value < 0.0 && !is_zero {
        grouped.push('-');
    }
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac_part) = frac_part {
        grouped.push('.');
        grouped.push_str(frac_part);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BreakevenConfig, run_project, solve_breakeven};

    fn screening_params() -> SimulationParameters {
        SimulationParameters {
            horizon_years: 5,
            max_production_rate: 1_000.0,
            build_up_years: 2,
            plateau_years: 1,
            decline_rate: 0.1,
            total_recoverable_reserves: 100_000.0,
            oil_price_per_unit: 70.0,
            operating_cost_per_unit: 35.0,
            tax_rate: 0.0,
            government_take_rate: 0.0,
            decommissioning_cost: 0.0,
            initial_investment: 0.0,
            discount_rate: 0.0,
        }
    }

    #[test]
    fn groups_thousands_and_keeps_sign() {
        assert_eq!(format_grouped(1_234_567.891, 2), "1,234,567.89");
        assert_eq!(format_grouped(-1_234.5, 2), "-1,234.50");
        assert_eq!(format_grouped(999.0, 1), "999.0");
        assert_eq!(format_grouped(100_000.0, 0), "100,000");
        assert_eq!(format_grouped(-0.004, 2), "0.00");
    }

    #[test]
    fn schedule_lists_every_year_totals_and_npv() {
        let params = screening_params();
        let result = run_project(&params);
        let text = render_schedule(&params, &result);

        assert!(text.contains("Production Rate (Barrels)"));
        assert!(text.contains("Net Cash Flow (USD)"));
        assert!(text.contains("Total Production Rate (Barrels) = 4,210.0"));
        assert!(text.contains("Total Net Cash Flow (USD) = 147,350.0"));
        assert!(text.contains("Calculated NPV: $147,350.00"));

        let data_rows = text
            .lines()
            .skip(2)
            .take_while(|line| !line.is_empty())
            .count();
        assert_eq!(data_rows, 5);
    }

    #[test]
    fn breakeven_summary_reports_solved_price() {
        let mut params = screening_params();
        params.initial_investment = 10_000.0;
        let config = BreakevenConfig::for_target(BreakevenTarget::OilPrice);
        let result = solve_breakeven(&params, config).expect("must solve");
        let text = render_breakeven(&result, run_project(&params).npv);

        assert!(text.contains("Base case NPV: $137,350.00"));
        assert!(text.contains("Breakeven oil price (USD/barrel): 37."));
        assert!(text.ends_with("Solved breakeven value.\n"));
    }

    #[test]
    fn breakeven_summary_reports_missing_value() {
        let params = screening_params();
        let config = BreakevenConfig {
            search_min: 100.0,
            search_max: 200.0,
            ..BreakevenConfig::for_target(BreakevenTarget::OilPrice)
        };
        let result = solve_breakeven(&params, config).expect("must return result");
        let text = render_breakeven(&result, run_project(&params).npv);

        assert!(text.contains("Breakeven oil price (USD/barrel): not found"));
        assert!(text.contains("Iterations: 0 (converged: false)"));
    }
}
