/*!
# CSV export of inference results

Enable via the `csv` feature.

```rust
use hopper::histogram::Histogram;
use hopper::io::csv::save_histogram_csv;
use tempfile::NamedTempFile;

let mut histogram = Histogram::new(0.0, 1.0, 2).unwrap();
histogram.accumulate(0.25);
let file = NamedTempFile::new().unwrap();
save_histogram_csv(&histogram, file.path().to_str().unwrap())
    .expect("Expecting saving histogram to succeed");
```
*/

use std::fs::File;

use csv::Writer;

use crate::error::Result;
use crate::histogram::Histogram;
use crate::network::Network;
use crate::observer::TraceObserver;

/**
Saves a histogram with one row per slot.

The header is `bin_start,bin_end,count`. The underflow row starts at `-inf` and
the overflow row ends at `inf`.
*/
pub fn save_histogram_csv(histogram: &Histogram, filename: &str) -> Result<()> {
    let mut wtr = Writer::from_writer(File::create(filename)?);
    wtr.write_record(["bin_start", "bin_end", "count"])?;

    let counts = histogram.counts();
    let last = histogram.num_bins() + 1;
    wtr.write_record([
        f64::NEG_INFINITY.to_string(),
        histogram.range_start().to_string(),
        counts[0].to_string(),
    ])?;
    for i in 0..histogram.num_bins() {
        let (lower, upper) = histogram.bin_edges(i);
        wtr.write_record([lower.to_string(), upper.to_string(), counts[i + 1].to_string()])?;
    }
    wtr.write_record([
        histogram.range_end().to_string(),
        f64::INFINITY.to_string(),
        counts[last].to_string(),
    ])?;

    wtr.flush()?;
    Ok(())
}

/**
Saves a recorded trace with one row per sweep.

The header is `sweep` followed by one column per traced node, named after the
node's debug name in `network` (or its handle when unnamed).
*/
pub fn save_trace_csv(trace: &TraceObserver, network: &Network, filename: &str) -> Result<()> {
    let mut wtr = Writer::from_writer(File::create(filename)?);

    let mut header = vec!["sweep".to_string()];
    header.extend(trace.nodes().iter().map(|&id| network.label(id)));
    wtr.write_record(&header)?;

    for (sweep, row) in trace.samples().rows().into_iter().enumerate() {
        let mut record = vec![sweep.to_string()];
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::observer::Observer;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn histogram_rows_include_outliers() {
        let mut histogram = Histogram::new(0.0, 2.0, 2).unwrap();
        for x in [-1.0, 0.5, 1.5, 1.7, 3.0] {
            histogram.accumulate(x);
        }
        let file = NamedTempFile::new().expect("Could not create temp file");
        let filename = file.path().to_str().unwrap();
        save_histogram_csv(&histogram, filename).unwrap();

        let contents = fs::read_to_string(filename).unwrap();
        let expected = "\
bin_start,bin_end,count
-inf,0,1
0,1,1
1,2,2
2,inf,1";
        assert_eq!(contents.trim(), expected);
    }

    #[test]
    fn trace_uses_node_labels() {
        let mut network = Network::new();
        let a = network.add(Node::evidence(1.0).unwrap().with_name("speed"));
        let b = network.add(Node::evidence(2.5).unwrap());
        let mut trace = TraceObserver::new(vec![a, b]);
        trace.on_sweep_complete(&network);
        trace.on_sweep_complete(&network);

        let file = NamedTempFile::new().expect("Could not create temp file");
        let filename = file.path().to_str().unwrap();
        save_trace_csv(&trace, &network, filename).unwrap();

        let contents = fs::read_to_string(filename).unwrap();
        let expected = "\
sweep,speed,#1
0,1,2.5
1,1,2.5";
        assert_eq!(contents.trim(), expected);
    }

    #[test]
    fn empty_trace_writes_header_only() {
        let network = Network::new();
        let trace = TraceObserver::new(vec![]);
        let file = NamedTempFile::new().expect("Could not create temp file");
        let filename = file.path().to_str().unwrap();
        save_trace_csv(&trace, &network, filename).unwrap();
        assert_eq!(fs::read_to_string(filename).unwrap().trim(), "sweep");
    }
}
