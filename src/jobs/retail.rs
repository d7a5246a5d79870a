//! Revenue rankings over retail invoice lines
//! (`Invoice,StockCode,Description,Quantity,InvoiceDate,Price,Customer ID,Country`).

use std::fmt;

use crate::common::{Mapper, Reducer};
use crate::configuration::JobSettings;
use crate::error::{MalformedRecord, MrError};
use crate::pipeline::{Chain, Pipeline};
use crate::step::{NoCombiner, Passthrough, Step};

use super::aggregate::{Regroup, SalesTotals, SumCombiner};
use super::funnel::{rank_step, top_k, Candidate, Funnel, RankStep};

const STOCK_CODE: usize = 1;
const QUANTITY: usize = 3;
const PRICE: usize = 5;
const CUSTOMER_ID: usize = 6;

fn field<'a>(fields: &[&'a str], index: usize, name: &str) -> Result<&'a str, MalformedRecord> {
    fields
        .get(index)
        .map(|f| f.trim())
        .ok_or_else(|| MalformedRecord::new(format!("missing {name}")))
}

/// Finite numbers only: NaN or infinity would outrank every real total.
fn number(fields: &[&str], index: usize, name: &str) -> Result<f64, MalformedRecord> {
    let raw = field(fields, index, name)?;
    let value = raw
        .parse::<f64>()
        .map_err(|e| MalformedRecord::new(format!("bad {name} {raw:?}: {e}")))?;
    if !value.is_finite() {
        return Err(MalformedRecord::new(format!("non-finite {name} {raw:?}")));
    }
    Ok(value)
}

/// Emits `(customer id, price × quantity)` per invoice line.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuyerMapper;

impl Mapper for BuyerMapper {
    type In = String;
    type Key = u64;
    type Value = f64;

    fn map(&self, line: String) -> Result<Vec<(u64, f64)>, MalformedRecord> {
        let fields: Vec<&str> = line.split(',').collect();
        let raw_id = field(&fields, CUSTOMER_ID, "customer id")?;
        let customer = raw_id
            .parse::<u64>()
            .map_err(|e| MalformedRecord::new(format!("bad customer id {raw_id:?}: {e}")))?;
        let price = number(&fields, PRICE, "price")?;
        let quantity = number(&fields, QUANTITY, "quantity")?;
        Ok(vec![(customer, price * quantity)])
    }
}

/// Emits `(stock code, totals)` per invoice line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductMapper;

impl Mapper for ProductMapper {
    type In = String;
    type Key = String;
    type Value = SalesTotals;

    fn map(&self, line: String) -> Result<Vec<(String, SalesTotals)>, MalformedRecord> {
        let fields: Vec<&str> = line.split(',').collect();
        let code = field(&fields, STOCK_CODE, "stock code")?;
        if code.is_empty() {
            return Err(MalformedRecord::new("empty stock code"));
        }
        let quantity = number(&fields, QUANTITY, "quantity")?;
        let price = number(&fields, PRICE, "price")?;
        Ok(vec![(
            code.to_string(),
            SalesTotals {
                quantity,
                revenue: price * quantity,
            },
        )])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SalesMetric {
    Quantity,
    Revenue,
}

impl fmt::Display for SalesMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SalesMetric::Quantity => f.write_str("quantity"),
            SalesMetric::Revenue => f.write_str("revenue"),
        }
    }
}

/// Picks the best product once by total quantity and once by total revenue.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestSellerReducer;

impl Reducer for BestSellerReducer {
    type Key = Funnel;
    type Value = Candidate<SalesTotals, String>;
    type OutKey = SalesMetric;
    type OutValue = Candidate<f64, String>;

    fn reduce(
        &self,
        _key: Funnel,
        products: Vec<Candidate<SalesTotals, String>>,
    ) -> Result<Vec<(SalesMetric, Candidate<f64, String>)>, MrError> {
        let by = |metric: fn(&SalesTotals) -> f64| {
            products
                .iter()
                .map(|c| Candidate::new(metric(&c.score), c.payload.clone()))
                .collect::<Vec<_>>()
        };

        let mut out = Vec::with_capacity(2);
        for (metric, candidates) in [
            (SalesMetric::Quantity, by(|t| t.quantity)),
            (SalesMetric::Revenue, by(|t| t.revenue)),
        ] {
            out.extend(top_k(candidates, 1).into_iter().map(|c| (metric, c)));
        }
        Ok(out)
    }
}

type ToFunnel<K> = fn(K) -> (Funnel, K);

pub type BuyerRevenue = Step<BuyerMapper, SumCombiner, Regroup<u64, f64, ToFunnel<u64>>>;
pub type ProductTotals =
    Step<ProductMapper, SumCombiner, Regroup<String, SalesTotals, ToFunnel<String>>>;
pub type BestSellerStep =
    Step<Passthrough<Funnel, Candidate<SalesTotals, String>>, NoCombiner, BestSellerReducer>;

pub type TopBuyers = Pipeline<
    Chain<BuyerRevenue, RankStep<Funnel, f64, u64>, (Funnel, Candidate<f64, u64>)>,
    String,
    (Funnel, Candidate<f64, u64>),
>;
pub type BestSeller = Pipeline<
    Chain<ProductTotals, BestSellerStep, (Funnel, Candidate<SalesTotals, String>)>,
    String,
    (SalesMetric, Candidate<f64, String>),
>;

/// Customers with the highest total revenue, best first.
pub fn top_buyers(settings: &JobSettings) -> TopBuyers {
    let revenue = Step::new(BuyerMapper, Regroup::funnel()).with_combiner(SumCombiner);
    Pipeline::new(revenue).then(rank_step(settings.top_k))
}

/// Best-selling product by total quantity and by total revenue.
pub fn best_seller() -> BestSeller {
    let totals = Step::new(ProductMapper, Regroup::funnel()).with_combiner(SumCombiner);
    Pipeline::new(totals).then(Step::new(Passthrough::new(), BestSellerReducer))
}
