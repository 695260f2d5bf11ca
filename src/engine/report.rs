use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;

use super::profile::Profile;
use super::EngineError;

/// Options applied when turning a profile into a report.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub sample_index: usize,
    pub divide_by: f64,
    /// Frames whose name matches any of these are dropped from every stack.
    pub hide: Vec<Regex>,
}

/// One row of the flat/cumulative table.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionStat {
    pub name: String,
    pub flat: i64,
    pub cum: i64,
}

/// Aggregated view of one sample type of a profile.
#[derive(Debug, Clone)]
pub struct Report {
    pub sample_type: String,
    pub sample_types: Vec<String>,
    pub duration_nanos: i64,
    pub total: i64,
    /// Root-first stack to summed value, zero-valued stacks omitted.
    stacks: BTreeMap<Vec<String>, i64>,
    /// Sorted by flat descending, then cum descending, then name.
    functions: Vec<FunctionStat>,
}

impl Report {
    pub fn build(profile: &Profile, opts: &ReportOptions) -> Result<Report, EngineError> {
        let frames = profile.location_frames();
        let mut stacks: BTreeMap<Vec<String>, i64> = BTreeMap::new();

        for sample in &profile.sample {
            let raw = sample.value.get(opts.sample_index).copied().unwrap_or(0);
            let value = scale(raw, opts.divide_by);
            if value == 0 {
                continue;
            }
            let mut stack: Vec<String> = sample
                .location_id
                .iter()
                .filter_map(|id| frames.get(id))
                .flatten()
                .filter(|name| !opts.hide.iter().any(|re| re.is_match(name)))
                .cloned()
                .collect();
            stack.reverse();
            accumulate(stacks.entry(stack).or_insert(0), value)?;
        }

        let mut flat: HashMap<&str, i64> = HashMap::new();
        let mut cum: HashMap<&str, i64> = HashMap::new();
        let mut total = 0;
        for (stack, value) in &stacks {
            accumulate(&mut total, *value)?;
            if let Some(leaf) = stack.last() {
                accumulate(flat.entry(leaf.as_str()).or_insert(0), *value)?;
            }
            let mut seen = HashSet::new();
            for name in stack {
                if seen.insert(name.as_str()) {
                    accumulate(cum.entry(name.as_str()).or_insert(0), *value)?;
                }
            }
        }

        let mut functions: Vec<FunctionStat> = cum
            .iter()
            .map(|(name, cum)| FunctionStat {
                name: name.to_string(),
                flat: flat.get(name).copied().unwrap_or(0),
                cum: *cum,
            })
            .collect();
        functions.sort_by(|a, b| {
            b.flat
                .cmp(&a.flat)
                .then(b.cum.cmp(&a.cum))
                .then(a.name.cmp(&b.name))
        });

        let sample_types = profile.sample_type_names();
        Ok(Report {
            sample_type: sample_types[opts.sample_index.min(sample_types.len() - 1)].clone(),
            sample_types,
            duration_nanos: profile.duration_nanos,
            total,
            stacks,
            functions,
        })
    }

    pub fn top(&self, limit: usize) -> &[FunctionStat] {
        &self.functions[..self.functions.len().min(limit)]
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Stacks in the folded `a;b;c value` format.
    pub fn folded(&self) -> Vec<String> {
        self.stacks
            .iter()
            .filter(|(stack, _)| !stack.is_empty())
            .map(|(stack, value)| {
                let frames: Vec<String> = stack.iter().map(|f| f.replace(';', ":")).collect();
                format!("{} {}", frames.join(";"), value)
            })
            .collect()
    }

    /// Callers and callees of every function matching `pattern`.
    pub fn peek(&self, pattern: &str) -> Result<Vec<Peek>, EngineError> {
        let re = compile(pattern)?;
        let mut out: BTreeMap<&str, Peek> = BTreeMap::new();
        for (stack, value) in &self.stacks {
            let mut seen = HashSet::new();
            for (i, name) in stack.iter().enumerate() {
                if !re.is_match(name) || !seen.insert(name.as_str()) {
                    continue;
                }
                let entry = out.entry(name.as_str()).or_insert_with(|| Peek {
                    name: name.clone(),
                    cum: 0,
                    callers: BTreeMap::new(),
                    callees: BTreeMap::new(),
                });
                accumulate(&mut entry.cum, *value)?;
                if i > 0 {
                    accumulate(entry.callers.entry(stack[i - 1].clone()).or_insert(0), *value)?;
                }
                if let Some(callee) = stack.get(i + 1) {
                    accumulate(entry.callees.entry(callee.clone()).or_insert(0), *value)?;
                }
            }
        }
        let mut peeks: Vec<Peek> = out.into_values().collect();
        peeks.sort_by(|a, b| b.cum.cmp(&a.cum).then(a.name.cmp(&b.name)));
        Ok(peeks)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Peek {
    pub name: String,
    pub cum: i64,
    pub callers: BTreeMap<String, i64>,
    pub callees: BTreeMap<String, i64>,
}

pub fn compile(pattern: &str) -> Result<Regex, EngineError> {
    Regex::new(pattern).map_err(|source| EngineError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

fn accumulate(sum: &mut i64, value: i64) -> Result<(), EngineError> {
    *sum = sum
        .checked_add(value)
        .ok_or_else(|| EngineError::Malformed("sample values overflow".into()))?;
    Ok(())
}

fn scale(value: i64, divide_by: f64) -> i64 {
    if divide_by == 1.0 || divide_by == 0.0 {
        value
    } else {
        (value as f64 / divide_by).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::profile::tests::sample_profile;

    fn opts(sample_index: usize) -> ReportOptions {
        ReportOptions {
            sample_index,
            divide_by: 1.0,
            hide: vec![],
        }
    }

    #[test]
    fn flat_and_cum_per_function() {
        let report = Report::build(&sample_profile(), &opts(1)).unwrap();
        assert_eq!(report.total, 400);
        assert_eq!(report.sample_type, "cpu/nanoseconds");
        let top = report.top(10);
        assert_eq!(top[0], FunctionStat { name: "leaf".into(), flat: 300, cum: 300 });
        assert_eq!(top[1], FunctionStat { name: "idle".into(), flat: 100, cum: 100 });
        let main = top.iter().find(|f| f.name == "main").unwrap();
        assert_eq!((main.flat, main.cum), (0, 400));
    }

    #[test]
    fn top_respects_limit() {
        let report = Report::build(&sample_profile(), &opts(1)).unwrap();
        assert_eq!(report.top(2).len(), 2);
        assert_eq!(report.top(100).len(), report.function_count());
    }

    #[test]
    fn recursion_counts_once_in_cum() {
        let mut p = sample_profile();
        p.sample[0].location_id = vec![3, 2, 2, 1];
        let report = Report::build(&p, &opts(0)).unwrap();
        let work = report.top(10).iter().find(|f| f.name == "work").unwrap().clone();
        assert_eq!(work.cum, 3);
    }

    #[test]
    fn folded_is_root_first() {
        let report = Report::build(&sample_profile(), &opts(0)).unwrap();
        let folded = report.folded();
        assert!(folded.contains(&"main;work;leaf 3".to_string()), "{folded:?}");
        assert!(folded.contains(&"main;idle 1".to_string()), "{folded:?}");
    }

    #[test]
    fn hide_drops_matching_frames() {
        let mut o = opts(0);
        o.hide = vec![compile("^work$").unwrap()];
        let report = Report::build(&sample_profile(), &o).unwrap();
        assert!(report.folded().contains(&"main;leaf 3".to_string()));
    }

    #[test]
    fn divide_by_scales_values() {
        let mut o = opts(1);
        o.divide_by = 100.0;
        let report = Report::build(&sample_profile(), &o).unwrap();
        assert_eq!(report.total, 4);
    }

    #[test]
    fn peek_reports_callers_and_callees() {
        let report = Report::build(&sample_profile(), &opts(0)).unwrap();
        let peeks = report.peek("^work$").unwrap();
        assert_eq!(peeks.len(), 1);
        assert_eq!(peeks[0].cum, 3);
        assert_eq!(peeks[0].callers.get("main"), Some(&3));
        assert_eq!(peeks[0].callees.get("leaf"), Some(&3));
    }

    #[test]
    fn overflowing_totals_are_malformed() {
        let mut p = sample_profile();
        for sample in &mut p.sample {
            sample.value[1] = i64::MAX - 10;
        }
        let err = Report::build(&p, &opts(1)).unwrap_err();
        assert!(matches!(err, EngineError::Malformed(_)), "{err}");
        assert_eq!(err.to_string(), "malformed profile: sample values overflow");
    }

    #[test]
    fn overflow_within_one_stack_is_malformed() {
        let mut p = sample_profile();
        let dup = p.sample[0].clone();
        p.sample[0].value[1] = i64::MAX;
        p.sample.push(dup);
        assert!(Report::build(&p, &opts(1)).is_err());
    }

    #[test]
    fn peek_rejects_bad_regexp() {
        let report = Report::build(&sample_profile(), &opts(0)).unwrap();
        assert!(matches!(report.peek("("), Err(EngineError::Regex { .. })));
    }
}
