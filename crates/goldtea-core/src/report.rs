//! # Reports
//!
//! Pure aggregation over a slice of sales for the dashboard and the report
//! screen. Callers fetch the sales for [`ReportPeriod::range`] (the sync
//! layer does this through its date-range cache) and pass the current time
//! in whatever time zone "today" should mean.
//!
//! ```text
//!   ReportPeriod::Month, now = 2024-03-14 16:20 (+05:30)
//!
//!   start = 2024-03-01 00:00:00.000 (+05:30)
//!   end   = 2024-03-14 23:59:59.999 (+05:30)
//! ```

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::money::Money;
use crate::types::{PaymentStatus, Sale};

/// Number of sales shown in the dashboard's recent list.
pub const RECENT_SALES: usize = 5;

/// Number of customers in the top-customers table.
pub const TOP_CUSTOMERS: usize = 5;

const UNKNOWN: &str = "Unknown";

// =============================================================================
// Periods
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    Today,
    /// Monday through today.
    Week,
    Month,
    Year,
}

impl ReportPeriod {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "today" => Some(ReportPeriod::Today),
            "week" => Some(ReportPeriod::Week),
            "month" => Some(ReportPeriod::Month),
            "year" => Some(ReportPeriod::Year),
            _ => None,
        }
    }

    /// Day-aligned `[start, end]` range ending at the close of today.
    pub fn range<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
        let tz = now.timezone();
        let today = now.date_naive();
        let first = match self {
            ReportPeriod::Today => today,
            ReportPeriod::Week => {
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
            }
            ReportPeriod::Month => today.with_day(1).unwrap_or(today),
            ReportPeriod::Year => today.with_ordinal(1).unwrap_or(today),
        };
        (start_of_day(&tz, first), end_of_day(&tz, today))
    }
}

/// The dashboard shows the current month up to the end of today.
pub fn dashboard_range<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    ReportPeriod::Month.range(now)
}

fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

fn end_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let next = date.succ_opt().unwrap_or(date);
    start_of_day(tz, next) - Duration::milliseconds(1)
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_sales: Money,
    pub today_sales: Money,
    /// Sum of balances still owed on pending sales.
    pub pending_payments: Money,
    pub count: usize,
    /// Most recent first.
    pub recent: Vec<Sale>,
}

impl DashboardSummary {
    pub fn from_sales<Tz: TimeZone>(sales: &[Sale], now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();

        let mut summary = DashboardSummary {
            total_sales: Money::zero(),
            today_sales: Money::zero(),
            pending_payments: Money::zero(),
            count: sales.len(),
            recent: Vec::new(),
        };

        for sale in sales {
            summary.total_sales += sale.total_amount;
            if sale.date.with_timezone(&tz).date_naive() == today {
                summary.today_sales += sale.total_amount;
            }
            if sale.payment_status == PaymentStatus::Pending {
                summary.pending_payments += sale.balance;
            }
        }

        let mut recent: Vec<Sale> = sales.to_vec();
        recent.sort_by(|a, b| b.date.cmp(&a.date));
        recent.truncate(RECENT_SALES);
        summary.recent = recent;
        summary
    }
}

// =============================================================================
// Period Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerStats {
    pub customer_name: String,
    pub village: String,
    pub total_amount: Money,
    pub sales_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub period: ReportPeriod,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: usize,
    pub revenue: Money,
    pub collected: Money,
    pub pending: Money,
    pub paid_count: usize,
    pub pending_count: usize,
    pub tea_type_counts: BTreeMap<String, usize>,
    /// Revenue per local calendar day.
    pub daily_totals: BTreeMap<NaiveDate, Money>,
    /// Highest total first, at most [`TOP_CUSTOMERS`].
    pub top_customers: Vec<CustomerStats>,
}

impl PeriodReport {
    pub fn from_sales<Tz: TimeZone>(
        period: ReportPeriod,
        sales: &[Sale],
        now: &DateTime<Tz>,
    ) -> Self {
        let tz = now.timezone();
        let (start, end) = period.range(now);

        let mut report = PeriodReport {
            period,
            start,
            end,
            count: sales.len(),
            revenue: Money::zero(),
            collected: Money::zero(),
            pending: Money::zero(),
            paid_count: 0,
            pending_count: 0,
            tea_type_counts: BTreeMap::new(),
            daily_totals: BTreeMap::new(),
            top_customers: Vec::new(),
        };
        let mut customers: HashMap<String, CustomerStats> = HashMap::new();

        for sale in sales {
            report.revenue += sale.total_amount;
            report.collected += sale.amount_paid;
            report.pending += sale.balance;
            match sale.payment_status {
                PaymentStatus::Paid => report.paid_count += 1,
                PaymentStatus::Pending => report.pending_count += 1,
            }

            let tea_type = non_empty_or_unknown(&sale.tea_type);
            *report.tea_type_counts.entry(tea_type).or_insert(0) += 1;

            let day = sale.date.with_timezone(&tz).date_naive();
            *report.daily_totals.entry(day).or_insert_with(Money::zero) += sale.total_amount;

            let stats = customers
                .entry(sale.customer_key())
                .or_insert_with(|| CustomerStats {
                    customer_name: non_empty_or_unknown(&sale.customer_name),
                    village: non_empty_or_unknown(&sale.village),
                    total_amount: Money::zero(),
                    sales_count: 0,
                });
            stats.total_amount += sale.total_amount;
            stats.sales_count += 1;
        }

        let mut top: Vec<CustomerStats> = customers.into_values().collect();
        top.sort_by(|a, b| {
            b.total_amount
                .cmp(&a.total_amount)
                .then_with(|| a.customer_name.cmp(&b.customer_name))
                .then_with(|| a.village.cmp(&b.village))
        });
        top.truncate(TOP_CUSTOMERS);
        report.top_customers = top;
        report
    }
}

fn non_empty_or_unknown(value: &str) -> String {
    if value.trim().is_empty() {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewSale;
    use chrono::FixedOffset;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    fn sale(customer: &str, tea: &str, rupees: i64, paid: Option<i64>, at: DateTime<Utc>) -> Sale {
        Sale::from_new(
            NewSale {
                date: at,
                village: "Rampur".to_string(),
                customer_name: customer.to_string(),
                brand: "GoldTea".to_string(),
                tea_type: tea.to_string(),
                packaging: "250gm".to_string(),
                rate: Money::from_rupees(rupees),
                quantity: 1.0,
                total_amount: None,
                amount_paid: paid.map(Money::from_rupees),
            },
            at,
        )
    }

    #[test]
    fn test_period_ranges() {
        // Thursday 2024-03-14 16:20 IST
        let now = ist().with_ymd_and_hms(2024, 3, 14, 16, 20, 0).unwrap();

        let (start, end) = ReportPeriod::Today.range(&now);
        assert_eq!(start, ist().with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap());
        assert_eq!(
            end,
            ist().with_ymd_and_hms(2024, 3, 14, 23, 59, 59).unwrap() + Duration::milliseconds(999)
        );

        let (start, _) = ReportPeriod::Week.range(&now);
        assert_eq!(start, ist().with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());

        let (start, _) = ReportPeriod::Month.range(&now);
        assert_eq!(start, ist().with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        let (start, _) = ReportPeriod::Year.range(&now);
        assert_eq!(start, ist().with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_dashboard_summary() {
        let now = ist().with_ymd_and_hms(2024, 3, 14, 16, 0, 0).unwrap();
        let today = now.with_timezone(&Utc);
        let earlier = today - Duration::days(2);

        let sales = vec![
            sale("Asha", "Mix", 100, None, earlier),
            sale("Ravi", "Barik", 200, Some(50), today),
            sale("Mona", "Mix", 300, Some(0), earlier - Duration::days(1)),
        ];
        let summary = DashboardSummary::from_sales(&sales, &now);

        assert_eq!(summary.count, 3);
        assert_eq!(summary.total_sales, Money::from_rupees(600));
        assert_eq!(summary.today_sales, Money::from_rupees(200));
        assert_eq!(summary.pending_payments, Money::from_rupees(450));
        assert_eq!(summary.recent[0].customer_name, "Ravi");
        assert_eq!(summary.recent[2].customer_name, "Mona");
    }

    #[test]
    fn test_period_report_aggregates() {
        let now = ist().with_ymd_and_hms(2024, 3, 14, 16, 0, 0).unwrap();
        let at = now.with_timezone(&Utc);

        let mut sales = vec![
            sale("Asha", "Mix", 100, None, at),
            sale("Asha", "Mix", 150, Some(100), at),
            sale("Ravi", "", 400, None, at - Duration::days(1)),
        ];
        for i in 0..5 {
            sales.push(sale(&format!("C{}", i), "Barik", 10, None, at));
        }

        let report = PeriodReport::from_sales(ReportPeriod::Month, &sales, &now);
        assert_eq!(report.count, 8);
        assert_eq!(report.revenue, Money::from_rupees(700));
        assert_eq!(report.collected, Money::from_rupees(650));
        assert_eq!(report.pending, Money::from_rupees(50));
        assert_eq!(report.pending_count, 1);
        assert_eq!(report.tea_type_counts["Mix"], 2);
        assert_eq!(report.tea_type_counts["Unknown"], 1);
        assert_eq!(report.tea_type_counts["Barik"], 5);
        assert_eq!(report.daily_totals.len(), 2);

        assert_eq!(report.top_customers.len(), TOP_CUSTOMERS);
        assert_eq!(report.top_customers[0].customer_name, "Ravi");
        assert_eq!(report.top_customers[1].customer_name, "Asha");
        assert_eq!(report.top_customers[1].sales_count, 2);
        assert_eq!(report.top_customers[1].total_amount, Money::from_rupees(250));
    }
}
