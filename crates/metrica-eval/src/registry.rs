//! Built-in equation rules and their categories.
//!
//! The default registry derives the valuation metric set from the raw metrics
//! bound in the default candidate table plus `Closing Price (USD)`. Rules are
//! declared dependencies-first.

use crate::rule::{Component, EquationRule, Operation};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Rule category classification.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleCategory {
    /// Year-invariant scalar assumptions
    Assumption,
    /// Building blocks consumed by other rules
    Foundation,
    /// Debt, cash and market value
    CapitalStructure,
    /// Earnings before interest and tax lines
    OperatingPerformance,
    /// Margins and returns on book capital
    Profitability,
    /// Return on invested capital
    ReturnOnCapital,
    /// Liquidity, leverage and coverage
    Solvency,
    /// Growth rates and forward projections
    Growth,
    /// Per-share figures and valuation multiples
    Valuation,
}

impl RuleCategory {
    /// Get a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &str {
        match self {
            Self::Assumption => "Scalar assumptions held constant across years",
            Self::Foundation => "Consolidated, averaged and grouped inputs for other rules",
            Self::CapitalStructure => "Debt, cash, market capitalization and enterprise value",
            Self::OperatingPerformance => "EBIT, EBITDA, pre-tax earnings and tax burden",
            Self::Profitability => "Margins and DuPont returns on assets and equity",
            Self::ReturnOnCapital => "Heavy and light ROIC with their NOPAT and invested capital",
            Self::Solvency => "Liquidity, debt ratios and interest coverage",
            Self::Growth => "Compound growth rates and three-year forward projections",
            Self::Valuation => "Per-share figures and price multiples",
        }
    }
}

fn rule<const N: usize>(
    category: RuleCategory,
    name: &str,
    operation: Operation,
    components: [Component; N],
    description: &str,
) -> EquationRule {
    EquationRule::new(name, operation, components)
        .in_category(category)
        .describe(description)
}

fn growth(name: &str, source: &str, years: usize, multiplier: f64) -> EquationRule {
    EquationRule::new(name, Operation::Cagr, [Component::from(source)])
        .with_lookback(years)
        .with_multiplier(multiplier)
        .in_category(RuleCategory::Growth)
        .describe(format!("{years}-year compound annual growth of {source}"))
}

/// Get every built-in rule, in evaluation order.
#[must_use]
pub fn available_rules() -> Vec<EquationRule> {
    use Operation as Op;
    use RuleCategory as Cat;

    let m = |name: &str| Component::from(name);
    let one = Component::Literal(1.0);

    let mut rules = vec![
        // Assumptions
        rule(
            Cat::Assumption,
            "Min Operating Cash (5-Year Lookback)",
            Op::MinRatioNYears,
            [m("Cash & Cash Equivelance"), m("Total Revenue")],
            "Lowest cash-to-revenue ratio over the five most recent years",
        )
        .with_lookback(5),
        // Foundations
        rule(
            Cat::Foundation,
            "Interest Expense Consolidated",
            Op::ConsolidateFill,
            [m("Interest Expense"), m("Interest Expense Non-Operating")],
            "Interest expense, filled from the non-operating line where missing",
        ),
        rule(
            Cat::Foundation,
            "Free Cash Flow",
            Op::Subtract,
            [m("Cash From Operations"), m("Payments To Acquire PP&E")],
            "Operating cash flow less capital expenditure",
        ),
        rule(
            Cat::Foundation,
            "Average Total Assets",
            Op::AveragePrior,
            [m("Total Assets")],
            "Mean of opening and closing total assets",
        ),
        rule(
            Cat::Foundation,
            "Average Shareholder Equity",
            Op::AveragePrior,
            [m("Shareholder/Stockholder Equity")],
            "Mean of opening and closing shareholder equity",
        ),
        rule(
            Cat::Foundation,
            "Book Value",
            Op::Subtract,
            [m("Total Assets"), m("Total Liabilities")],
            "Total assets less total liabilities",
        ),
        rule(
            Cat::Foundation,
            "Tangible Book Value",
            Op::Subtract,
            [
                m("Book Value"),
                m("Preferred Stock"),
                m("Goodwill"),
                m("Net Intangible Assets"),
            ],
            "Book value less preferred stock, goodwill and intangibles",
        ),
        rule(
            Cat::Foundation,
            "Accounts Recievable + Inventory + Prepaid Expenses",
            Op::Add,
            [m("Accounts Receivable"), m("Inventory"), m("Prepaid Expenses")],
            "Receivables, inventory and prepaid expenses",
        ),
        rule(
            Cat::Foundation,
            "Notes Payable + Current Bank Overdraft + Commercial Papers",
            Op::Add,
            [
                m("Notes Payable"),
                m("Commercial Papers"),
                m("Current Bank Overdraft"),
            ],
            "Interest bearing current liabilities",
        ),
        rule(
            Cat::Foundation,
            "Net Intangible Assets + Net PP&E + Goodwill",
            Op::Add,
            [m("Net Intangible Assets"), m("Net PP&E"), m("Goodwill")],
            "Long-lived operating assets",
        ),
        rule(
            Cat::Foundation,
            "Net Intangible Assets + Net PP&E + Goodwill + Operating Lease ROU Asset",
            Op::Add,
            [
                m("Net Intangible Assets + Net PP&E + Goodwill"),
                m("Operating Lease ROU Asset"),
            ],
            "Long-lived operating assets including right-of-use assets",
        ),
        rule(
            Cat::Foundation,
            "Cash and Cash Equivalent + Short Term Investments + Accounts Recievable",
            Op::Add,
            [
                m("Cash & Cash Equivelance"),
                m("Short Term Investments"),
                m("Accounts Receivable"),
            ],
            "Quick assets",
        ),
        // Capital structure
        rule(
            Cat::CapitalStructure,
            "Interest Bearing Debt",
            Op::Add,
            [
                m("Short Term Debt (STD)"),
                m("Long Term Debt (LTD)"),
                m("Operating Lease Liability"),
            ],
            "Short and long term debt plus operating lease liabilities",
        ),
        rule(
            Cat::CapitalStructure,
            "Net Debt",
            Op::Subtract,
            [m("Interest Bearing Debt"), m("Cash & Cash Equivelance")],
            "Interest bearing debt less cash",
        ),
        rule(
            Cat::CapitalStructure,
            "Market Cap",
            Op::Multiply,
            [m("Closing Price (USD)"), m("Total Common Shares Outstanding")],
            "Year-end price times common shares outstanding",
        ),
        rule(
            Cat::CapitalStructure,
            "Enterprise Value",
            Op::Add,
            [
                m("Market Cap"),
                m("Net Debt"),
                m("Preferred Stock"),
                m("Minority Interest"),
            ],
            "Market cap plus net debt, preferred stock and minority interest",
        ),
        // Operating performance
        rule(
            Cat::OperatingPerformance,
            "EBITDA",
            Op::Add,
            [
                m("Operating Income"),
                m("Depreciation, Depletion, and Amortization"),
            ],
            "Operating income before depreciation and amortization",
        ),
        rule(
            Cat::OperatingPerformance,
            "EBIT",
            Op::Subtract,
            [m("Gross Profit"), m("Operating Expense (EBIT)")],
            "Gross profit less operating expenses",
        ),
        rule(
            Cat::OperatingPerformance,
            "EBT",
            Op::Subtract,
            [m("EBIT"), m("Interest Expense Consolidated")],
            "EBIT less interest expense",
        ),
        rule(
            Cat::OperatingPerformance,
            "Tax Rate",
            Op::Divide,
            [m("Income Tax Expense"), m("EBT")],
            "Effective tax rate on pre-tax earnings",
        ),
        rule(
            Cat::OperatingPerformance,
            "Tax Retention Ratio",
            Op::Subtract,
            [one.clone(), m("Tax Rate")],
            "Share of pre-tax earnings kept after tax",
        ),
        rule(
            Cat::OperatingPerformance,
            "Tax Burden",
            Op::Divide,
            [m("Net Income"), m("EBT")],
            "Net income over pre-tax earnings",
        ),
        rule(
            Cat::OperatingPerformance,
            "Interest Burden",
            Op::Divide,
            [m("EBT"), m("EBIT")],
            "Pre-tax earnings over EBIT",
        ),
        // Profitability
        rule(
            Cat::Profitability,
            "Asset Turnover Ratio",
            Op::Divide,
            [m("Total Revenue"), m("Average Total Assets")],
            "Revenue over average total assets",
        ),
        rule(
            Cat::Profitability,
            "Operating Margin",
            Op::Divide,
            [m("EBIT"), m("Total Revenue")],
            "EBIT as a fraction of revenue",
        ),
        rule(
            Cat::Profitability,
            "Financial Leverage",
            Op::Divide,
            [m("Average Total Assets"), m("Average Shareholder Equity")],
            "Average total assets over average shareholder equity",
        ),
        rule(
            Cat::Profitability,
            "Gross Profit Margin (%)",
            Op::Divide,
            [m("Gross Profit"), m("Total Revenue")],
            "Gross profit as a percentage of revenue",
        )
        .as_percentage(),
        rule(
            Cat::Profitability,
            "Net Profit Margin (%)",
            Op::Divide,
            [m("Net Income"), m("Total Revenue")],
            "Net income as a percentage of revenue",
        )
        .as_percentage(),
        rule(
            Cat::Profitability,
            "Operating Profit Margin (%)",
            Op::Divide,
            [m("EBIT"), m("Total Revenue")],
            "EBIT as a percentage of revenue",
        )
        .as_percentage(),
        // Return on invested capital
        rule(
            Cat::ReturnOnCapital,
            "Net Working Capital (Heavy)",
            Op::Subtract,
            [m("Current Assets"), m("Current Liabilities")],
            "Current assets less current liabilities",
        ),
        rule(
            Cat::ReturnOnCapital,
            "Invested Capital (Heavy)",
            Op::Add,
            [m("Net PP&E"), m("Net Working Capital (Heavy)")],
            "Net PP&E plus net working capital",
        ),
        rule(
            Cat::ReturnOnCapital,
            "Embedded Lease Interest",
            Op::Multiply,
            [
                m("Operating Lease Liability"),
                m("Weighted Average Lease Discount Rate"),
            ],
            "Interest implied by operating lease liabilities",
        ),
        rule(
            Cat::ReturnOnCapital,
            "Net Operating Profit After Taxes (Heavy)",
            Op::Multiply,
            [m("Operating Income"), m("Tax Retention Ratio")],
            "Operating income after tax",
        ),
        rule(
            Cat::ReturnOnCapital,
            "Net Operating Profit After Taxes (Light)",
            Op::Add,
            [
                m("Net Operating Profit After Taxes (Heavy)"),
                m("Embedded Lease Interest"),
            ],
            "NOPAT with embedded lease interest added back",
        ),
        rule(
            Cat::ReturnOnCapital,
            "ROIC (Heavy)",
            Op::Divide,
            [
                m("Net Operating Profit After Taxes (Heavy)"),
                m("Invested Capital (Heavy)"),
            ],
            "NOPAT over heavy invested capital",
        ),
        rule(
            Cat::ReturnOnCapital,
            "Operating Cash",
            Op::Multiply,
            [m("Min Operating Cash (5-Year Lookback)"), m("Total Revenue")],
            "Cash needed to run the business at the historical minimum ratio",
        ),
        rule(
            Cat::ReturnOnCapital,
            "Excess Cash",
            Op::Subtract,
            [m("Cash & Cash Equivelance"), m("Operating Cash")],
            "Cash beyond operating needs",
        ),
        rule(
            Cat::ReturnOnCapital,
            "Excess Cash + Short Term Investments",
            Op::Add,
            [m("Excess Cash"), m("Short Term Investments")],
            "Non-operating current assets",
        ),
        rule(
            Cat::ReturnOnCapital,
            "Operating Current Assets",
            Op::Subtract,
            [m("Current Assets"), m("Excess Cash + Short Term Investments")],
            "Current assets less non-operating current assets",
        ),
        rule(
            Cat::ReturnOnCapital,
            "Non Interest Bearing Current Liabilitites",
            Op::Subtract,
            [
                m("Current Liabilities"),
                m("Notes Payable + Current Bank Overdraft + Commercial Papers"),
            ],
            "Current liabilities less interest bearing current liabilities",
        ),
        rule(
            Cat::ReturnOnCapital,
            "Net Working Capital (Light)",
            Op::Subtract,
            [
                m("Operating Current Assets"),
                m("Non Interest Bearing Current Liabilitites"),
            ],
            "Operating current assets less non-interest bearing current liabilities",
        ),
        rule(
            Cat::ReturnOnCapital,
            "Invested Capital (Light)",
            Op::Add,
            [
                m("Net Intangible Assets + Net PP&E + Goodwill + Operating Lease ROU Asset"),
                m("Net Working Capital (Light)"),
            ],
            "Long-lived operating assets plus light net working capital",
        ),
        rule(
            Cat::ReturnOnCapital,
            "ROIC (Light)",
            Op::Divide,
            [
                m("Net Operating Profit After Taxes (Light)"),
                m("Invested Capital (Light)"),
            ],
            "Lease-adjusted NOPAT over light invested capital",
        ),
        // Returns on assets and equity
        rule(
            Cat::Profitability,
            "Interest Expense Consolidated * Tax Burden",
            Op::Multiply,
            [m("Interest Expense Consolidated"), m("Tax Burden")],
            "After-tax interest expense",
        ),
        rule(
            Cat::Profitability,
            "Net Income + Interest Expense Consolidated * Tax Burden",
            Op::Add,
            [
                m("Interest Expense Consolidated * Tax Burden"),
                m("Net Income"),
            ],
            "Net income with after-tax interest added back",
        ),
        rule(
            Cat::Profitability,
            "Return On Assets",
            Op::Divide,
            [
                m("Net Income + Interest Expense Consolidated * Tax Burden"),
                m("Average Total Assets"),
            ],
            "Interest-adjusted net income over average total assets",
        ),
        rule(
            Cat::Profitability,
            "Tax Burden * Interest Burden",
            Op::Multiply,
            [m("Tax Burden"), m("Interest Burden")],
            "DuPont tax and interest burden",
        ),
        rule(
            Cat::Profitability,
            "Tax Burden * Interest Burden * Operating Margin",
            Op::Multiply,
            [m("Tax Burden * Interest Burden"), m("Operating Margin")],
            "DuPont burdens times operating margin",
        ),
        rule(
            Cat::Profitability,
            "Tax Burden * Interest Burden * Operating Margin * Asset Turnover Ratio",
            Op::Multiply,
            [
                m("Tax Burden * Interest Burden * Operating Margin"),
                m("Asset Turnover Ratio"),
            ],
            "DuPont return on assets",
        ),
        rule(
            Cat::Profitability,
            "Return On Equity",
            Op::Multiply,
            [
                m("Tax Burden * Interest Burden * Operating Margin * Asset Turnover Ratio"),
                m("Financial Leverage"),
            ],
            "DuPont return on equity",
        ),
        // Per share and multiples
        rule(
            Cat::Valuation,
            "Tangible Book Value Per Share",
            Op::Divide,
            [m("Tangible Book Value"), m("Total Common Shares Outstanding")],
            "Tangible book value per common share",
        ),
        rule(
            Cat::Valuation,
            "Price To Book (P/B Ratio)",
            Op::Divide,
            [m("Closing Price (USD)"), m("Tangible Book Value Per Share")],
            "Year-end price over tangible book value per share",
        ),
        rule(
            Cat::Valuation,
            "EV / EBITDA",
            Op::Divide,
            [m("Enterprise Value"), m("EBITDA")],
            "Enterprise value over EBITDA",
        ),
        rule(
            Cat::Valuation,
            "EV / Share",
            Op::Divide,
            [m("Enterprise Value"), m("Total Common Shares Outstanding")],
            "Enterprise value per common share",
        ),
        rule(
            Cat::Valuation,
            "Earnings Per Share (EPS)",
            Op::Divide,
            [m("Net Income"), m("Total Common Shares Outstanding")],
            "Net income per common share",
        ),
        rule(
            Cat::Valuation,
            "P/E Ratio (Calculated)",
            Op::Divide,
            [m("Closing Price (USD)"), m("Earnings Per Share (EPS)")],
            "Year-end price over earnings per share",
        ),
        // Solvency
        rule(
            Cat::Solvency,
            "Quick Ratio 'Liquid Ratio'",
            Op::Divide,
            [
                m("Cash and Cash Equivalent + Short Term Investments + Accounts Recievable"),
                m("Current Liabilities"),
            ],
            "Quick assets over current liabilities",
        ),
        rule(
            Cat::Solvency,
            "Adjusted Debt to Equity Ratio",
            Op::Divide,
            [m("Net Debt"), m("Shareholder/Stockholder Equity")],
            "Net debt over shareholder equity",
        ),
        rule(
            Cat::Solvency,
            "Adjusted Debt to Asset Ratio",
            Op::Divide,
            [m("Net Debt"), m("Total Assets")],
            "Net debt over total assets",
        ),
        rule(
            Cat::Solvency,
            "Interest Coverage Ratio",
            Op::Divide,
            [m("EBITDA"), m("Interest Expense Consolidated")],
            "EBITDA over interest expense",
        ),
    ];

    for (source, name) in [
        ("Total Revenue", "Total Revenue CAGR (5-Year) (%)"),
        ("Net Income", "Net Income CAGR (5-Year) (%)"),
        ("Total Assets", "Total Assets CAGR (5-Year) (%)"),
        (
            "Total Common Shares Outstanding",
            "Total Common Shares Outstanding CAGR (5-Year) (%)",
        ),
    ] {
        rules.push(growth(name, source, 5, 100.0));
    }

    for (source, name) in [
        ("Cash From Operations", "Cash From Operations CAGR (3-Year) (%)"),
        ("Earnings Per Share (EPS)", "Earnings Per Share (EPS) CAGR (3-Year) (%)"),
        ("Gross Profit Margin (%)", "Gross Profit Margin (%) CAGR (3-Year) (%)"),
        ("Operating Profit Margin (%)", "Operating Profit Margin (%) CAGR (3-Year) (%)"),
        ("Net Profit Margin (%)", "Net Profit Margin (%) CAGR (3-Year) (%)"),
        ("Return On Assets", "Return On Assets (%) CAGR (3-Year) (%)"),
        ("Return On Equity", "Return On Equity (%) CAGR (3-Year)"),
        ("ROIC (Heavy)", "ROIC (Heavy) CAGR (3-Year) (%)"),
        ("ROIC (Light)", "ROIC (Light) CAGR (3-Year) (%)"),
        ("Market Cap", "Market Cap (%) CAGR (3-Year)"),
        ("Enterprise Value", "Enterprise Value (%) CAGR (3-Year)"),
        ("Tangible Book Value Per Share", "Tangible Book Value Per Share (%) CAGR (3-Year)"),
        ("P/E Ratio (Calculated)", "P/E Ratio (Calculated) (%) CAGR (3-Year)"),
        ("Price To Book (P/B Ratio)", "Price To Book (P/B Ratio) (%) CAGR (3-Year)"),
        ("EV / EBITDA", "EV / EBITDA (%) CAGR (3-Year)"),
        ("EV / Share", "EV / Share (%) CAGR (3-Year)"),
        ("Total Revenue", "Total Revenue (%) CAGR (3-Year)"),
        ("Net Income", "Net Income (%) CAGR (3-Year)"),
        ("Total Assets", "Total Assets (%) CAGR (3-Year)"),
        ("Shareholder/Stockholder Equity", "Shareholder/Stockholder Equity (%) CAGR (3-Year)"),
        ("Adjusted Debt to Equity Ratio", "Adjusted Debt to Equity Ratio (%) CAGR (3-Year)"),
        ("Adjusted Debt to Asset Ratio", "Adjusted Debt to Asset Ratio (%) CAGR (3-Year)"),
        ("Quick Ratio 'Liquid Ratio'", "Quick Ratio 'Liquid Ratio' (%) CAGR (3-Year)"),
        ("Interest Coverage Ratio", "Interest Coverage Ratio (%) CAGR (3-Year)"),
        ("Tax Retention Ratio", "Tax Retention Ratio (%) CAGR (3-Year)"),
        ("Asset Turnover Ratio", "Asset Turnover Ratio (%) CAGR (3-Year)"),
        ("Interest Bearing Debt", "Interest Bearing Debt CAGR (3-Year) (%)"),
    ] {
        rules.push(growth(name, source, 3, 100.0));
    }

    rules.extend([
        growth("Total Revenue CAGR (3-Year)", "Total Revenue", 3, 1.0),
        rule(
            Cat::Growth,
            "1 + Revenue CAGR",
            Op::Add,
            [m("Total Revenue CAGR (3-Year)"), one],
            "Annual revenue growth factor",
        ),
        rule(
            Cat::Growth,
            "(1 + Revenue CAGR)^3",
            Op::Multiply,
            [
                m("1 + Revenue CAGR"),
                m("1 + Revenue CAGR"),
                m("1 + Revenue CAGR"),
            ],
            "Three-year revenue growth factor",
        ),
        rule(
            Cat::Growth,
            "Revenue 3-Year Forward",
            Op::Multiply,
            [m("(1 + Revenue CAGR)^3"), m("Total Revenue")],
            "Revenue projected three years ahead at the historical growth rate",
        ),
        rule(
            Cat::Profitability,
            "Free Cash Flow Margin",
            Op::Divide,
            [m("Free Cash Flow"), m("Total Revenue")],
            "Free cash flow as a fraction of revenue",
        ),
        rule(
            Cat::Growth,
            "FCF Forward (3Y)",
            Op::Multiply,
            [m("Revenue 3-Year Forward"), m("Free Cash Flow Margin")],
            "Free cash flow projected three years ahead at today's margin",
        ),
        rule(
            Cat::Valuation,
            "EV / FCF Forward (3Y)",
            Op::Divide,
            [m("Enterprise Value"), m("FCF Forward (3Y)")],
            "Enterprise value over projected free cash flow",
        ),
        rule(
            Cat::Valuation,
            "Gross Profit / EV",
            Op::Divide,
            [m("Gross Profit"), m("Enterprise Value")],
            "Gross profit yield on enterprise value",
        ),
        rule(
            Cat::Valuation,
            "Price / Sales",
            Op::Divide,
            [m("Market Cap"), m("Total Revenue")],
            "Market cap over revenue",
        ),
        rule(
            Cat::Valuation,
            "PEG Ratio (Calculated)",
            Op::Divide,
            [
                m("P/E Ratio (Calculated)"),
                m("Earnings Per Share (EPS) CAGR (3-Year) (%)"),
            ],
            "P/E ratio over EPS growth in percent",
        ),
    ]);
    rules
}

/// Get all built-in rules in a specific category.
#[must_use]
pub fn rules_by_category(category: &RuleCategory) -> Vec<EquationRule> {
    available_rules()
        .into_iter()
        .filter(|rule| rule.category().as_ref() == Some(category))
        .collect()
}

/// Get a built-in rule by name.
#[must_use]
pub fn get_rule_info(name: &str) -> Option<EquationRule> {
    available_rules().into_iter().find(|rule| rule.name() == name)
}

/// Get all categories with built-in rules, in declaration order.
#[must_use]
pub fn available_categories() -> Vec<RuleCategory> {
    let mut categories: Vec<RuleCategory> = Vec::new();
    for category in available_rules().iter().filter_map(EquationRule::category) {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    categories
}
