// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::Ranking;
use misfit_core::MisfitError;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::warn;

const SUMMARY_RULE: &str = "-------------------------------------------------------";

/// `sqrt(value / count)`, with an empty population normalizing to zero.
pub fn normalized_misfit(value: f64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (value / count as f64).sqrt()
}

impl Ranking {
    /// Observation keys of the first valid member, in lexical order.
    pub fn observation_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = (0..self.len())
            .find_map(|iens| self.scores(iens))
            .map(|scores| scores.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn observation_count(&self) -> usize {
        self.observation_keys().len() * self.len()
    }

    fn valid_total_sum(&self) -> f64 {
        (0..self.len())
            .filter(|&iens| self.is_valid(iens))
            .map(|iens| self.totals()[iens])
            .sum()
    }

    /// Renders the compact per-member summary.
    ///
    /// Returns `Ok(None)` when no member is valid.
    pub fn render_summary(&self) -> Result<Option<String>, MisfitError> {
        if self.valid_count() == 0 {
            return Ok(None);
        }
        let permutation = self.permutation()?;
        let ens_size = self.len();
        let num_obs_total = self.observation_count();

        let mut out = String::new();
        out.push_str("\n\n");
        out.push_str("  #    Realization    Normalized misfit    Total misfit\n");
        out.push_str(SUMMARY_RULE);
        out.push('\n');
        for (position, &iens) in permutation.iter().enumerate() {
            if self.is_valid(iens) {
                let total = self.totals()[iens];
                out.push_str(&format!(
                    "{position:>3}    {iens:>3}                   {:>10.3}      {total:>10.3}  \n",
                    normalized_misfit(total, num_obs_total)
                ));
            } else {
                out.push_str(&format!(
                    "{position:>3}    {iens:>3}                   {:>10}      {:>10}  \n",
                    "invalid", "-"
                ));
            }
        }
        let summed_up = self.valid_total_sum();
        out.push_str(&format!(
            "        All                  {:>10.3}      {summed_up:>10.3}  \n",
            normalized_misfit(summed_up, num_obs_total * ens_size)
        ));
        out.push_str(SUMMARY_RULE);
        out.push('\n');
        Ok(Some(out))
    }

    /// Writes the summary to `out`; a ranking without valid members only
    /// logs a warning.
    pub fn write_summary<W: Write>(&self, out: &mut W) -> Result<(), MisfitError> {
        let Some(summary) = self.render_summary()? else {
            warn!("no valid results loaded for this ranking");
            return Ok(());
        };
        out.write_all(summary.as_bytes())
            .map_err(|err| MisfitError::storage_write(format!("failed writing ranking summary: {err}")))
    }

    /// Prints the summary to stdout.
    pub fn display(&self) -> Result<(), MisfitError> {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        self.write_summary(&mut lock)
    }

    /// Renders the full table with one `Norm Total` column pair per key.
    pub fn render_table(&self) -> Result<String, MisfitError> {
        let permutation = self.permutation()?;
        let keys = self.observation_keys();
        let ens_size = self.len();
        let num_obs_total = keys.len() * ens_size;

        let mut out = String::new();
        out.push_str("                       Overall  ");
        for key in &keys {
            out.push_str(&format!(" {key:>18} "));
        }
        out.push('\n');
        out.push_str("  #    Realization  Norm    Total");
        for _ in &keys {
            out.push_str("       Norm    Total");
        }
        out.push('\n');

        let mut key_sums = vec![0.0; keys.len()];
        for (position, &iens) in permutation.iter().enumerate() {
            let Some(scores) = self.scores(iens) else {
                out.push_str(&format!(" {position:>2}       {iens:>3}     {:>7} {:>8}", "invalid", "-"));
                for _ in &keys {
                    out.push_str(&format!(" {:>10} {:>8}", "-", "-"));
                }
                out.push('\n');
                continue;
            };

            let total = self.totals()[iens];
            out.push_str(&format!(
                " {position:>2}       {iens:>3}     {:>7.3} {total:>8.3}",
                normalized_misfit(total, num_obs_total)
            ));
            for (slot, key) in keys.iter().enumerate() {
                let value = *scores.get(key).ok_or_else(|| {
                    MisfitError::missing_key(format!(
                        "member {iens} has no score for observation key '{key}'"
                    ))
                })?;
                key_sums[slot] += value;
                out.push_str(&format!(
                    " {:>10.3} {value:>8.3}",
                    normalized_misfit(value, num_obs_total)
                ));
            }
            out.push('\n');
        }

        let summed_up = self.valid_total_sum();
        out.push_str(&format!(
            "           All    {:>7.3} {summed_up:>8.3}",
            normalized_misfit(summed_up, num_obs_total * ens_size)
        ));
        for key_sum in key_sums {
            out.push_str(&format!(
                " {:>10.3} {key_sum:>8.3}",
                normalized_misfit(key_sum, num_obs_total * ens_size)
            ));
        }
        out.push('\n');
        Ok(out)
    }

    /// Writes the full table to `path`, creating parent directories.
    pub fn fprintf(&self, path: impl AsRef<Path>) -> Result<(), MisfitError> {
        let path = path.as_ref();
        let table = self.render_table()?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                MisfitError::storage_write(format!(
                    "failed creating report directory '{}': {err}",
                    parent.display()
                ))
            })?;
        }
        fs::write(path, table).map_err(|err| {
            MisfitError::storage_write(format!(
                "failed writing ranking report '{}': {err}",
                path.display()
            ))
        })
    }
}
