//! The four stages of a feeder study, run one by one or back to back.

use std::fs;
use std::io::Write;

use tracing::info;

use crate::basic::limits::ViolationReport;
use crate::basic::post_processing::{BusResult, LineResult, PostProcessing};
use crate::basic::system::{PFNetwork, RunPF};
use crate::basic::PowerFlowResult;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::io::database::{FeederDb, Table};
use crate::io::export::{write_csv, write_json};
use crate::io::report::{run_batch, BatchSummary};
use crate::timeseries::{run_profile, LoadProfile, TimeSeriesData};
use crate::viz::{self, ChartSpec, Series, TopologyGraph};

/// Everything the solve stage produces.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub base: PowerFlowResult,
    pub res_bus: Vec<BusResult>,
    pub res_line: Vec<LineResult>,
    pub timeseries: TimeSeriesData,
    pub violations: ViolationReport,
}

/// A configured study holding the one database connection of the run.
pub struct Pipeline {
    cfg: Config,
    db: FeederDb,
}

impl Pipeline {
    pub fn open(cfg: Config) -> Result<Self> {
        let db = FeederDb::open(&cfg.paths.database)?;
        Ok(Self { cfg, db })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn db(&self) -> &FeederDb {
        &self.db
    }

    /// Creates the schema and appends the four CSV files. `fresh` empties the tables first.
    pub fn load(&mut self, fresh: bool) -> Result<()> {
        let ddl = fs::read_to_string(&self.cfg.paths.schema_sql)?;
        self.db.create_schema(&ddl)?;
        if fresh {
            self.db.clear_tables()?;
        }
        let paths = &self.cfg.paths;
        for (table, file) in [
            (Table::Bus, &paths.bus_csv),
            (Table::Line, &paths.line_csv),
            (Table::Load, &paths.load_csv),
            (Table::LoadProfile, &paths.profile_csv),
        ] {
            self.db.append_csv(table, file)?;
        }
        println!("Data loaded into {}", paths.database.display());
        Ok(())
    }

    /// Runs the analysis query batch, printing to `out`.
    pub fn report<W: Write>(&self, out: &mut W) -> Result<BatchSummary> {
        let text = fs::read_to_string(&self.cfg.paths.queries_sql)?;
        writeln!(out, "\n++++ SQL RESULTS +++++\n")?;
        let summary = run_batch(&self.db, &text, out)?;
        info!(succeeded = summary.succeeded, failed = summary.failed, "query batch done");
        Ok(summary)
    }

    /// Topology and load plots drawn straight from the tables.
    pub fn plot(&self) -> Result<()> {
        println!("\nCreating plots...");
        fs::create_dir_all(&self.cfg.paths.output_dir)?;
        let bus_loads = self.db.read_bus_loads()?;
        let graph = TopologyGraph::from_edges(self.db.read_edges()?);

        let auto = viz::spring_layout(&graph, self.cfg.plots.layout_iterations);
        viz::draw_topology(
            &self.cfg.output_file("network_topology.svg"),
            "IEEE 33 Bus Network Topology",
            &graph,
            &auto,
        )?;
        viz::draw_load_bars(&self.cfg.output_file("load_per_bus.svg"), &bus_loads)?;
        viz::draw_load_histogram(
            &self.cfg.output_file("load_histogram.svg"),
            &bus_loads,
            viz::HISTOGRAM_BINS,
        )?;
        let fixed = viz::fixed_layout(&graph, &self.cfg.plots.coordinates)?;
        viz::draw_topology(
            &self.cfg.output_file("network_topology_fixed.svg"),
            "IEEE 33-bus Topology (Fixed coordinates)",
            &graph,
            &fixed,
        )?;
        Ok(())
    }

    /// Builds the network, solves the base case and the profile, exports and checks the results.
    pub fn solve(&self) -> Result<SolveOutcome> {
        println!("\n++++ Building network from SQL tables ++++");
        let tables = self.db.read_tables()?;
        let mut net = PFNetwork::from_tables(
            &tables.buses,
            &tables.lines,
            &tables.loads,
            &self.cfg.network,
        )?;

        let base = net.run_pf(net.create_v_init(), &self.cfg.solver)?;
        println!("Power flow converged: {}", base.converged);
        if !base.converged {
            return Err(Error::NotConverged {
                iterations: base.iterations,
                mismatch_mva: base.mismatch * net.s_base,
            });
        }
        info!(iterations = base.iterations, "base case solved");

        let res_bus = net.res_bus(&base.v);
        let res_line = net.res_line(&base.v);
        net.print_res_bus(&base.v);
        net.print_res_line(&base.v);
        write_csv(&self.cfg.output_file("res_bus.csv"), &res_bus)?;
        write_csv(&self.cfg.output_file("res_line.csv"), &res_line)?;

        let profile = LoadProfile::new(self.db.read_profile()?);
        let timeseries = run_profile(&mut net, &profile, Some(&base), &self.cfg.solver)?;
        write_json(&self.cfg.output_file("timeseries_summary.json"), &timeseries.summary())?;

        if self.cfg.plots.enabled {
            self.plot_results(&res_bus, &res_line, &timeseries)?;
        }

        println!("\n ++++ Violation check ++++");
        let violations = ViolationReport::check(&res_bus, &res_line, &self.cfg.limits)?;
        println!("{violations}");

        Ok(SolveOutcome {
            base,
            res_bus,
            res_line,
            timeseries,
            violations,
        })
    }

    fn plot_results(
        &self,
        res_bus: &[BusResult],
        res_line: &[LineResult],
        ts: &TimeSeriesData,
    ) -> Result<()> {
        let bus_ids: Vec<f64> = res_bus.iter().map(|b| b.bus_id as f64).collect();
        let vm: Vec<f64> = res_bus.iter().map(|b| b.vm_pu).collect();
        viz::draw_line_chart(
            &self.cfg.output_file("voltage_profile_from_sql.svg"),
            &ChartSpec {
                title: "Voltage Profiles",
                x_desc: "Bus ID",
                y_desc: "Voltage (p.u.)",
                y_range: Some(0.9..1.05),
            },
            &[Series::new("Vm", &bus_ids, &vm)],
        )?;

        let line_index: Vec<f64> = (0..res_line.len()).map(|i| i as f64).collect();
        let loading: Vec<f64> = res_line.iter().map(|l| l.loading_percent).collect();
        viz::draw_line_chart(
            &self.cfg.output_file("line_loading_from_sql.svg"),
            &ChartSpec {
                title: "Line Loading",
                x_desc: "Line index",
                y_desc: "Loading (%)",
                y_range: None,
            },
            &[Series::new("Loading", &line_index, &loading)],
        )?;

        let hours: Vec<f64> = ts.hours().into_iter().map(|h| h as f64).collect();
        viz::draw_line_chart(
            &self.cfg.output_file("voltage_timeseries.svg"),
            &ChartSpec {
                title: "Network Voltage Over Time",
                x_desc: "Hour",
                y_desc: "Voltage (p.u.)",
                y_range: None,
            },
            &[
                Series::new("Min V (network)", &hours, &ts.min_vm()),
                Series::new("Max V (network)", &hours, &ts.max_vm()),
            ],
        )?;
        viz::draw_line_chart(
            &self.cfg.output_file("max_line_loading_timeseries.svg"),
            &ChartSpec {
                title: "Max Line Loading Over Time",
                x_desc: "Hour",
                y_desc: "Max Line Loading (%)",
                y_range: None,
            },
            &[Series::new("Max loading", &hours, &ts.max_loading())],
        )?;

        let mut selected = Vec::with_capacity(self.cfg.plots.selected_buses.len());
        for s in &self.cfg.plots.selected_buses {
            let values = ts.bus_series(s.bus).ok_or_else(|| Error::UnknownBus {
                element: format!("selected bus '{}'", s.label),
                bus: s.bus,
            })?;
            selected.push(Series::new(format!("{} Bus {}", s.label, s.bus), &hours, &values));
        }
        viz::draw_line_chart(
            &self.cfg.output_file("voltage_timeseries_selected_buses.svg"),
            &ChartSpec {
                title: "Time-series Voltage Profile",
                x_desc: "Hour",
                y_desc: "Voltage (p.u.)",
                y_range: Some(0.9..1.05),
            },
            &selected,
        )?;
        Ok(())
    }

    /// load, report, plot and solve in order.
    pub fn run_all<W: Write>(&mut self, fresh: bool, out: &mut W) -> Result<SolveOutcome> {
        self.load(fresh)?;
        self.report(out)?;
        if self.cfg.plots.enabled {
            self.plot()?;
        }
        let outcome = self.solve()?;
        println!("\nDONE");
        Ok(outcome)
    }
}
