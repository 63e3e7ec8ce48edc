//! Writes a demo sales dataset as `sample_sales.csv` and `sample_sales.parquet`
//! into the directory given as the first argument (default: current directory).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate};
use parquet::arrow::ArrowWriter;

use rusty_lens::data::export::write_csv;
use rusty_lens::data::model::{CellValue, Column, Dataset};

const ROWS: usize = 500;
const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
const PRODUCTS: [(&str, f64); 5] = [
    ("Widget", 12.5),
    ("Gadget", 30.0),
    ("Gizmo", 8.75),
    ("Doohickey", 45.0),
    ("Thingamajig", 19.9),
];
const FIRST_NAMES: [&str; 8] = ["Ada", "Ben", "Cleo", "Dev", "Eli", "Fay", "Gus", "Hana"];

/// Small deterministic PRNG (xorshift64*).
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Rng(seed.max(1))
    }

    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    /// Box-Muller.
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.unit().max(1e-15);
        let u2 = self.unit();
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

struct Rows {
    date: Vec<String>,
    region: Vec<String>,
    product: Vec<String>,
    customer: Vec<String>,
    units: Vec<i64>,
    price: Vec<f64>,
    revenue: Vec<f64>,
}

fn generate(rng: &mut Rng) -> Rows {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    let mut rows = Rows {
        date: Vec::with_capacity(ROWS),
        region: Vec::with_capacity(ROWS),
        product: Vec::with_capacity(ROWS),
        customer: Vec::with_capacity(ROWS),
        units: Vec::with_capacity(ROWS),
        price: Vec::with_capacity(ROWS),
        revenue: Vec::with_capacity(ROWS),
    };
    for i in 0..ROWS {
        let day = start + Duration::days(rng.below(365) as i64);
        let (product, base_price) = PRODUCTS[rng.below(PRODUCTS.len())];
        let units = rng.gauss(20.0, 8.0).round().max(1.0) as i64;
        let price = (base_price * rng.gauss(1.0, 0.08)).max(0.5);
        let price = (price * 100.0).round() / 100.0;
        rows.date.push(day.format("%Y-%m-%d").to_string());
        rows.region.push(REGIONS[rng.below(REGIONS.len())].to_string());
        rows.product.push(product.to_string());
        rows.customer
            .push(format!("{} #{}", FIRST_NAMES[rng.below(FIRST_NAMES.len())], 1000 + i));
        rows.units.push(units);
        rows.price.push(price);
        rows.revenue.push(((units as f64 * price) * 100.0).round() / 100.0);
    }
    rows
}

fn to_dataset(rows: &Rows) -> Result<Dataset> {
    let text = |v: &[String]| -> Vec<CellValue> { v.iter().cloned().map(CellValue::Text).collect() };
    let float = |v: &[f64]| -> Vec<CellValue> { v.iter().copied().map(CellValue::Float).collect() };
    Ok(Dataset::new(vec![
        Column::new("date", text(&rows.date)),
        Column::new("region", text(&rows.region)),
        Column::new("product", text(&rows.product)),
        Column::new("customer", text(&rows.customer)),
        Column::new("units", rows.units.iter().copied().map(CellValue::Integer).collect()),
        Column::new("price", float(&rows.price)),
        Column::new("revenue", float(&rows.revenue)),
    ])?)
}

fn to_batch(rows: &Rows) -> Result<RecordBatch> {
    let strings = |v: &[String]| -> ArrayRef {
        Arc::new(StringArray::from(v.iter().map(String::as_str).collect::<Vec<_>>()))
    };
    let schema = Arc::new(Schema::new(vec![
        Field::new("date", DataType::Utf8, false),
        Field::new("region", DataType::Utf8, false),
        Field::new("product", DataType::Utf8, false),
        Field::new("customer", DataType::Utf8, false),
        Field::new("units", DataType::Int64, false),
        Field::new("price", DataType::Float64, false),
        Field::new("revenue", DataType::Float64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        strings(&rows.date),
        strings(&rows.region),
        strings(&rows.product),
        strings(&rows.customer),
        Arc::new(Int64Array::from(rows.units.clone())),
        Arc::new(Float64Array::from(rows.price.clone())),
        Arc::new(Float64Array::from(rows.revenue.clone())),
    ];
    RecordBatch::try_new(schema, columns).context("building record batch")
}

fn main() -> Result<()> {
    env_logger::init();
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let rows = generate(&mut Rng::new(42));

    let csv_path = out_dir.join("sample_sales.csv");
    write_csv(&to_dataset(&rows)?, &csv_path)?;

    let parquet_path = out_dir.join("sample_sales.parquet");
    let batch = to_batch(&rows)?;
    let file = std::fs::File::create(&parquet_path)
        .with_context(|| format!("creating {}", parquet_path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;

    println!(
        "Wrote {ROWS} rows to {} and {}",
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
