//! Built-in candidate table for the valuation metric set.

use crate::candidate::{CandidateSpec, CandidateTable, MetricBinding, Sign};
use crate::observation::UnitFamily;
use std::iter;

fn tags(names: &[&str]) -> Vec<CandidateSpec> {
    names.iter().map(|n| CandidateSpec::tag(*n)).collect()
}

/// `first - rest[0] - rest[1] - ...`
fn less(first: &str, rest: &[&str]) -> CandidateSpec {
    CandidateSpec::Composite(
        iter::once((Sign::Plus, first.to_string()))
            .chain(rest.iter().map(|t| (Sign::Minus, (*t).to_string())))
            .collect(),
    )
}

fn with(
    mut specs: Vec<CandidateSpec>,
    extra: impl IntoIterator<Item = CandidateSpec>,
) -> Vec<CandidateSpec> {
    specs.extend(extra);
    specs
}

/// Built-in candidate table.
///
/// Covers the income statement, operating expense lines, balance sheet,
/// working capital, capital structure, share count, cash flow and lease inputs
/// consumed by the default equation registry.
#[must_use]
pub fn default_candidates() -> CandidateTable {
    use CandidateSpec as C;

    let mut table = CandidateTable::new();
    let mut money = |name: &str, specs: Vec<CandidateSpec>| {
        table.insert(name, MetricBinding::monetary(specs));
    };

    // Income statement
    money(
        "Total Revenue",
        tags(&[
            "Revenues",
            "RevenueFromContractWithCustomerExcludingAssessedTax",
            "SalesRevenueNet",
        ]),
    );
    money(
        "Net Income",
        tags(&["NetIncomeLoss", "IncomeLossFromContinuingOperations"]),
    );
    money("Operating Income", tags(&["OperatingIncomeLoss"]));
    money(
        "Cost of Goods Sold",
        tags(&["CostOfGoodsAndServicesSold", "CostOfGoodsSold", "CostOfRevenue"]),
    );
    money(
        "Gross Profit",
        with(
            tags(&["GrossProfit"]),
            [
                C::difference("Revenues", "CostOfGoodsAndServicesSold"),
                C::difference("Revenues", "CostOfRevenue"),
                C::difference("Revenues", "CostOfGoodsSold"),
                C::difference(
                    "RevenueFromContractWithCustomerExcludingAssessedTax",
                    "CostOfRevenue",
                ),
                C::difference(
                    "RevenueFromContractWithCustomerExcludingAssessedTax",
                    "CostOfGoodsAndServicesSold",
                ),
            ],
        ),
    );
    money(
        "Depreciation, Depletion, and Amortization",
        with(
            tags(&["DepreciationDepletionAndAmortization"]),
            [
                C::sum(&["DepreciationAndAmortization", "Depletion"]),
                C::sum(&["DepreciationAndAmortization", "DepletionExpense"]),
                C::sum(&["Depreciation", "AmortizationOfIntangibleAssets", "Depletion"]),
                C::tag("DepreciationAndAmortization"),
                C::sum(&["AmortizationOfIntangibleAssets", "Depreciation"]),
                C::tag("Depreciation"),
            ],
        ),
    );
    money(
        "Operating Expense (EBIT)",
        with(
            tags(&["OperatingExpense"]),
            [
                C::difference("GrossProfit", "OperatingIncomeLoss"),
                less("Revenues", &["CostOfGoodsAndServicesSold", "OperatingIncomeLoss"]),
                less("Revenues", &["CostOfRevenue", "OperatingIncomeLoss"]),
                less("Revenues", &["CostOfGoodsSold", "OperatingIncomeLoss"]),
                less(
                    "RevenueFromContractWithCustomerExcludingAssessedTax",
                    &["CostOfRevenue", "OperatingIncomeLoss"],
                ),
                less(
                    "RevenueFromContractWithCustomerExcludingAssessedTax",
                    &["CostOfGoodsAndServicesSold", "OperatingIncomeLoss"],
                ),
                less(
                    "RevenueFromContractWithCustomerExcludingAssessedTax",
                    &["CostOfGoodsSold", "OperatingIncomeLoss"],
                ),
                C::sum(&[
                    "ResearchAndDevelopmentExpense",
                    "GeneralAndAdministrativeExpense",
                    "SellingAndMarketingExpense",
                ]),
                C::sum(&[
                    "ResearchAndDevelopmentExpense",
                    "SellingGeneralAndAdministrativeExpense",
                    "OtherOperatingExpenses",
                ]),
                C::sum(&[
                    "ResearchAndDevelopmentExpense",
                    "GeneralAndAdministrativeExpense",
                    "SellingExpense",
                ]),
            ],
        ),
    );
    money("Selling & Marketing Expense", tags(&["SellingAndMarketingExpense"]));
    money("Research & Development Expense", tags(&["ResearchAndDevelopmentExpense"]));
    money("General & Administrative Expense", tags(&["GeneralAndAdministrativeExpense"]));
    money("Other Operating Expense", tags(&["OtherOperatingExpense"]));
    money("Income Tax Expense", tags(&["IncomeTaxExpenseBenefit"]));
    money(
        "Income Before Tax",
        tags(&[
            "IncomeLossBeforeIncomeTaxExpenseBenefit",
            "IncomeLossFromContinuingOperationsBeforeIncomeTaxExpenseBenefit",
        ]),
    );

    // Balance sheet
    money("Total Assets", tags(&["Assets", "AssetsTotal"]));
    money(
        "Total Liabilities",
        with(
            tags(&["Liabilities", "LiabilitiesTotal"]),
            [
                C::difference("LiabilitiesAndStockholdersEquity", "StockholdersEquity"),
                C::sum(&["LiabilitiesCurrent", "LiabilitiesNoncurrent"]),
            ],
        ),
    );
    money(
        "Shareholder/Stockholder Equity",
        tags(&["StockholdersEquity", "ShareholdersEquity", "Equity"]),
    );
    money(
        "Current Assets",
        with(
            tags(&["AssetsCurrent"]),
            [
                C::difference("Assets", "AssetsNoncurrent"),
                C::difference("Assets", "NoncurrentAssets"),
            ],
        ),
    );
    money(
        "Current Liabilities",
        with(
            tags(&["LiabilitiesCurrent"]),
            [C::difference("Liabilities", "LiabilitiesNoncurrent")],
        ),
    );
    money(
        "Net PP&E",
        with(
            tags(&[
                "PropertyPlantAndEquipmentNet",
                "PropertyPlantAndEquipmentAndFinanceLeaseRightOfUseAssetAfterAccumulatedDepreciationAndAmortization",
            ]),
            [C::difference(
                "PropertyPlantAndEquipment",
                "AccumulatedDepreciationDepletionAndAmortization",
            )],
        ),
    );
    money("Goodwill", tags(&["Goodwill"]));
    money(
        "Net Intangible Assets",
        with(
            tags(&[
                "IntangibleAssetsNetExcludingGoodwill",
                "IntangibleAssetsOtherThanGoodwillNet",
                "FiniteLivedIntangibleAssetsNet",
            ]),
            [C::difference("IntangibleAssets", "Goodwill")],
        ),
    );

    // Working capital
    money("Inventory", tags(&["InventoryNet", "Inventory"]));
    money(
        "Accounts Receivable",
        with(
            vec![C::sum(&["AccountsReceivableNetCurrent", "AccountsReceivableNetNoncurrent"])],
            tags(&["AccountsReceivableNetCurrent", "AccountsReceivableNetNoncurrent"]),
        ),
    );
    money(
        "Prepaid Expenses",
        with(
            vec![C::difference("PrepaidExpenseAndOtherAssetsCurrent", "OtherAssetsCurrent")],
            tags(&["PrepaidExpenseAndOtherAssetsCurrent", "OtherAssetsCurrent"]),
        ),
    );
    money(
        "Notes Payable",
        tags(&["LongTermNotesPayable", "NotesPayable", "NotesPayableCurrent"]),
    );
    money("Commercial Papers", tags(&["CommercialPaper"]));
    money(
        "Current Bank Overdraft",
        tags(&["CashOverdraft", "CurrentBankOverdraft", "BankOverdraft"]),
    );

    // Capital structure
    money(
        "Cash & Cash Equivelance",
        tags(&[
            "CashAndCashEquivalentsAtCarryingValue",
            "CashAndCashEquivalents",
            "CashCashEquivalentsRestrictedCashAndRestrictedCashEquivalents",
        ]),
    );
    money(
        "Short Term Investments",
        with(
            tags(&["MarketableSecuritiesCurrent", "ShortTermInvestments"]),
            [
                C::difference(
                    "CashCashEquivalentsAndShortTermInvestments",
                    "CashAndCashEquivalentsAtCarryingValue",
                ),
                C::difference("MarketableSecurities", "MarketableSecuritiesNoncurrent"),
            ],
        ),
    );
    money(
        "Short Term Debt (STD)",
        with(
            tags(&[
                "LongTermDebtCurrent",
                "ConvertibleSeniorNotesCurrent",
                "NotesPayableCurrent",
            ]),
            [
                C::difference("LongTermDebt", "LongTermDebtNoncurrent"),
                C::sum(&[
                    "LongTermDebtCurrent",
                    "ConvertibleSeniorNotesCurrent",
                    "NotesPayableCurrent",
                ]),
                C::sum(&[
                    "ConvertibleSeniorNotesCurrent",
                    "NotesPayableCurrent",
                    "OperatingLeaseLiabilityCurrent",
                ]),
            ],
        ),
    );
    money(
        "Long Term Debt (LTD)",
        with(
            tags(&["ConvertibleSeniorNotes", "LongTermDebt"]),
            [
                C::sum(&["ConvertibleSeniorNotes", "LongTermDebt", "OperatingLeaseLiability"]),
                C::sum(&["ConvertibleSeniorNotes", "OperatingLeaseLiability"]),
            ],
        ),
    );
    money("Operating Lease Liability", tags(&["OperatingLeaseLiability"]));
    let convertible = ["ConvertibleSeniorNotesNoncurrent", "ConvertibleSeniorNotesCurrent"];
    money(
        "Convertible Senior Notes",
        with(
            tags(&["ConvertibleSeniorNotes"]),
            with(vec![C::sum(&convertible)], tags(&convertible)),
        ),
    );
    money(
        "Preferred Stock",
        tags(&["PreferredStockValueOutstanding", "PreferredStockValue"]),
    );
    money(
        "Minority Interest",
        tags(&[
            "MinorityInterest",
            "NoncontrollingInterest",
            "NetIncomeLossAttributableToNoncontrollingInterest",
            "NoncontrollingInterestInVariableInterestEntity",
        ]),
    );

    // Cash flow
    money(
        "Cash From Operations",
        tags(&[
            "NetCashProvidedByUsedInOperatingActivities",
            "CashAndCashEquivalentsProvidedByUsedInOperatingActivities",
            "NetCashProvidedByUsedInOperatingActivitiesContinuingOperations",
            "NetCashFlowsFromUsedInOperatingActivities",
        ]),
    );
    money(
        "Payments To Acquire PP&E",
        tags(&[
            "PaymentsToAcquirePropertyPlantAndEquipment",
            "PaymentsToAcquireProductiveAssets",
        ]),
    );
    money(
        "Payments For Repurchase of Stock",
        tags(&["PaymentsForRepurchaseOfCommonStock", "PaymentsForRepurchaseOfEquity"]),
    );
    money(
        "Dividend Common Stock Cash",
        tags(&[
            "DividendCommonStockCash",
            "PaymentsOfDividendsCommonStock",
            "PaymentsOfDividends",
        ]),
    );
    money(
        "Repayment Of Debt",
        tags(&[
            "RepaymentsOfDebtAndCapitalLeaseObligations",
            "PaymentsForRepaymentOfDebt",
        ]),
    );
    money(
        "Proceeds From Issuance Of Debt",
        tags(&["ProceedsFromDebtNetOfIssuanceCosts", "ProceedsFromIssuanceOfDebt"]),
    );

    // Leases and interest
    money("Operating Lease ROU Asset", tags(&["OperatingLeaseRightOfUseAsset"]));
    money(
        "Interest Expense Non-Operating",
        tags(&["InterestExpenseNonoperating"]),
    );
    money(
        "Interest Expense",
        tags(&[
            "InterestExpense",
            "InterestExpenseDebt",
            "InterestPaidNet",
            "InterestExpenseOperating",
        ]),
    );

    table.insert(
        "Weighted Average Lease Discount Rate",
        MetricBinding::with_unit(UnitFamily::Ratio, tags(&["WeightedAverageDiscountRate"])),
    );

    // Share counts
    table.insert(
        "Total Common Shares Outstanding",
        MetricBinding::with_unit(
            UnitFamily::Shares,
            tags(&[
                "CommonStockSharesOutstanding",
                "WeightedAverageNumberOfSharesOutstandingBasic",
            ]),
        ),
    );
    table.insert(
        "Preferred Stock Issued",
        MetricBinding::with_unit(UnitFamily::Shares, tags(&["PreferredStockSharesIssued"])),
    );

    table
}
