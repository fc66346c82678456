use serde::Serialize;

/// Fully validated inputs for one screening run.
///
/// Rates are fractions (0.10 means 10%), volumes are barrels and money is USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub horizon_years: u32,
    pub max_production_rate: f64,
    pub build_up_years: u32,
    pub plateau_years: u32,
    pub decline_rate: f64,
    pub total_recoverable_reserves: f64,
    pub oil_price_per_unit: f64,
    pub operating_cost_per_unit: f64,
    pub tax_rate: f64,
    pub government_take_rate: f64,
    pub decommissioning_cost: f64,
    pub initial_investment: f64,
    pub discount_rate: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductionPhase {
    BuildUp,
    Plateau,
    Decline,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashFlowFields {
    pub revenue: f64,
    pub operating_cost: f64,
    pub gross_profit: f64,
    pub tax: f64,
    pub government_take: f64,
    pub net_cash_flow: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyRecord {
    pub year: u32,
    pub phase: ProductionPhase,
    pub production_rate: f64,
    pub revenue: f64,
    pub operating_cost: f64,
    pub gross_profit: f64,
    pub tax: f64,
    pub government_take: f64,
    pub net_cash_flow: f64,
    /// Contribution of this year's net cash flow to the NPV.
    pub discounted_net_cash_flow: f64,
    /// Produced volume up to and including this year.
    pub cumulative_production: f64,
}

impl YearlyRecord {
    pub fn value(&self, column: ScheduleColumn) -> f64 {
        match column {
            ScheduleColumn::ProductionRate => self.production_rate,
            ScheduleColumn::Revenue => self.revenue,
            ScheduleColumn::OperatingCost => self.operating_cost,
            ScheduleColumn::GrossProfit => self.gross_profit,
            ScheduleColumn::Tax => self.tax,
            ScheduleColumn::GovernmentTake => self.government_take,
            ScheduleColumn::NetCashFlow => self.net_cash_flow,
        }
    }
}

/// Non-year columns of the annual schedule, in display order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScheduleColumn {
    ProductionRate,
    Revenue,
    OperatingCost,
    GrossProfit,
    Tax,
    GovernmentTake,
    NetCashFlow,
}

impl ScheduleColumn {
    pub const ALL: [ScheduleColumn; 7] = [
        ScheduleColumn::ProductionRate,
        ScheduleColumn::Revenue,
        ScheduleColumn::OperatingCost,
        ScheduleColumn::GrossProfit,
        ScheduleColumn::Tax,
        ScheduleColumn::GovernmentTake,
        ScheduleColumn::NetCashFlow,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ScheduleColumn::ProductionRate => "Production Rate (Barrels)",
            ScheduleColumn::Revenue => "Revenue (USD)",
            ScheduleColumn::OperatingCost => "Operating Cost (USD)",
            ScheduleColumn::GrossProfit => "Gross Profit (USD)",
            ScheduleColumn::Tax => "Tax (USD)",
            ScheduleColumn::GovernmentTake => "Government Take (USD)",
            ScheduleColumn::NetCashFlow => "Net Cash Flow (USD)",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTotals {
    pub production_rate: f64,
    pub revenue: f64,
    pub operating_cost: f64,
    pub gross_profit: f64,
    pub tax: f64,
    pub government_take: f64,
    pub net_cash_flow: f64,
}

impl ScheduleTotals {
    pub fn get(&self, column: ScheduleColumn) -> f64 {
        match column {
            ScheduleColumn::ProductionRate => self.production_rate,
            ScheduleColumn::Revenue => self.revenue,
            ScheduleColumn::OperatingCost => self.operating_cost,
            ScheduleColumn::GrossProfit => self.gross_profit,
            ScheduleColumn::Tax => self.tax,
            ScheduleColumn::GovernmentTake => self.government_take,
            ScheduleColumn::NetCashFlow => self.net_cash_flow,
        }
    }

    fn add(mut self, record: &YearlyRecord) -> Self {
        self.production_rate += record.production_rate;
        self.revenue += record.revenue;
        self.operating_cost += record.operating_cost;
        self.gross_profit += record.gross_profit;
        self.tax += record.tax;
        self.government_take += record.government_take;
        self.net_cash_flow += record.net_cash_flow;
        self
    }
}

/// Headroom above the column maximum on chart y-axes.
const CHART_HEADROOM: f64 = 1.15;

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectResult {
    pub years: Vec<YearlyRecord>,
    pub npv: f64,
}

impl ProjectResult {
    pub fn totals(&self) -> ScheduleTotals {
        self.years
            .iter()
            .fold(ScheduleTotals::default(), |acc, record| acc.add(record))
    }

    pub fn total_production(&self) -> f64 {
        self.years.iter().map(|r| r.production_rate).sum()
    }

    pub fn series(&self, column: ScheduleColumn) -> Vec<(u32, f64)> {
        self.years
            .iter()
            .map(|r| (r.year, r.value(column)))
            .collect()
    }

    /// Chart range for a column: always anchored at 0.
    pub fn y_axis_range(&self, column: ScheduleColumn) -> (f64, f64) {
        let max = self
            .years
            .iter()
            .map(|r| r.value(column))
            .fold(f64::NEG_INFINITY, f64::max);
        if max.is_finite() && max > 0.0 {
            (0.0, max * CHART_HEADROOM)
        } else {
            (0.0, 1.0)
        }
    }
}
