//! The staged bootstrap plan.
//!
//! Phases form a small dependency graph that is resolved into a run order
//! with a declaration-order-stable topological sort: independent phases
//! always run in the order they were declared, so inserting a custom phase
//! never reorders the built-in ones.

use crate::error::AbortReason;

/// Built-in phase names.
pub mod names {
    pub const ENGINE_INIT: &str = "plinth.engine.init";
    pub const INIT: &str = "plinth.init";
    pub const CONFIGURE_LOGGER: &str = "plinth.configure.logger";
    pub const CONFIGURE_STATIC: &str = "plinth.configure.static";
    pub const CONFIGURE_CACHE: &str = "plinth.configure.cache";
    pub const CONFIGURE_BODY_PARSER: &str = "plinth.configure.bodyParser";
    pub const CONFIGURE_COOKIE_PARSER: &str = "plinth.configure.cookieParser";
    pub const CONFIGURE_SESSION: &str = "plinth.configure.session";
    pub const CONFIGURE_ROUTER: &str = "plinth.configure.router";
    pub const CONFIGURE_ROUTES: &str = "plinth.configure.routes";
    pub const CONFIGURE_ERROR_HANDLERS: &str = "plinth.configure.errorHandlers";
    pub const CONFIGURE_UNHANDLED_ERROR_HANDLER: &str =
        "plinth.configure.unhandledErrorHandler";
    pub const START: &str = "plinth.start";
    pub const ENGINE_READY: &str = "plinth.engine.ready";
    pub const READY: &str = "plinth.ready";
}

/// One stage of the bootstrap sequence.
#[derive(Debug, Clone)]
pub struct Phase {
    pub name: &'static str,
    pub depends_on: &'static [&'static str],
    /// A skip signal here skips this phase's default install only; the
    /// sequence continues.
    pub cancelable: bool,
    /// A skip signal or a listener failure here aborts the whole run.
    pub hard_gate: bool,
    /// Only runs when dual-protocol mode is on.
    pub dual_only: bool,
}

pub fn builtin_phases() -> Vec<Phase> {
    fn phase(
        name: &'static str,
        depends_on: &'static [&'static str],
        cancelable: bool,
    ) -> Phase {
        Phase {
            name,
            depends_on,
            cancelable,
            hard_gate: false,
            dual_only: false,
        }
    }

    use names::*;
    vec![
        Phase {
            dual_only: true,
            ..phase(ENGINE_INIT, &[], true)
        },
        phase(INIT, &[ENGINE_INIT], true),
        phase(CONFIGURE_LOGGER, &[INIT], true),
        phase(CONFIGURE_STATIC, &[CONFIGURE_LOGGER], true),
        phase(CONFIGURE_CACHE, &[CONFIGURE_STATIC], true),
        phase(CONFIGURE_BODY_PARSER, &[CONFIGURE_CACHE], true),
        phase(CONFIGURE_COOKIE_PARSER, &[CONFIGURE_BODY_PARSER], true),
        phase(CONFIGURE_SESSION, &[CONFIGURE_COOKIE_PARSER], true),
        phase(CONFIGURE_ROUTER, &[CONFIGURE_SESSION], true),
        phase(CONFIGURE_ROUTES, &[CONFIGURE_ROUTER], true),
        phase(CONFIGURE_ERROR_HANDLERS, &[CONFIGURE_ROUTES], true),
        phase(
            CONFIGURE_UNHANDLED_ERROR_HANDLER,
            &[CONFIGURE_ERROR_HANDLERS],
            true,
        ),
        phase(START, &[CONFIGURE_UNHANDLED_ERROR_HANDLER], true),
        Phase {
            hard_gate: true,
            dual_only: true,
            ..phase(ENGINE_READY, &[START], false)
        },
        Phase {
            hard_gate: true,
            ..phase(READY, &[START], false)
        },
    ]
}

/// Resolve the run order. Dependencies on phases absent from the plan (for
/// example engine phases in single-protocol mode) count as satisfied.
pub fn order(phases: &[Phase], dual_protocol: bool) -> Result<Vec<Phase>, AbortReason> {
    let plan: Vec<&Phase> = phases
        .iter()
        .filter(|phase| dual_protocol || !phase.dual_only)
        .collect();

    let mut ordered: Vec<Phase> = Vec::with_capacity(plan.len());
    let mut emitted: Vec<&str> = Vec::with_capacity(plan.len());
    let mut remaining: Vec<&Phase> = plan.clone();

    while !remaining.is_empty() {
        let position = remaining.iter().position(|phase| {
            phase.depends_on.iter().all(|dep| {
                emitted.contains(dep) || !plan.iter().any(|other| other.name == *dep)
            })
        });
        match position {
            Some(index) => {
                let phase = remaining.remove(index);
                emitted.push(phase.name);
                ordered.push(phase.clone());
            }
            None => {
                let stuck: Vec<&str> = remaining.iter().map(|phase| phase.name).collect();
                return Err(AbortReason::Configuration(format!(
                    "phase dependency cycle involving: {}",
                    stuck.join(", ")
                )));
            }
        }
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_order_is_declaration_order() {
        let ordered = order(&builtin_phases(), true).unwrap();
        let names: Vec<&str> = ordered.iter().map(|phase| phase.name).collect();
        let declared: Vec<&str> = builtin_phases().iter().map(|phase| phase.name).collect();
        assert_eq!(names, declared);
    }

    #[test]
    fn engine_phases_drop_out_of_single_protocol_runs() {
        let ordered = order(&builtin_phases(), false).unwrap();
        assert!(!ordered.iter().any(|phase| phase.name == names::ENGINE_INIT));
        assert!(!ordered.iter().any(|phase| phase.name == names::ENGINE_READY));
        // init's dependency on the missing engine phase counts as satisfied
        assert_eq!(ordered.first().map(|phase| phase.name), Some(names::INIT));
    }

    #[test]
    fn inserted_phases_respect_dependencies_and_declaration_order() {
        let mut phases = builtin_phases();
        phases.push(Phase {
            name: "plinth.configure.metricsProbe",
            depends_on: &[names::CONFIGURE_ROUTES],
            cancelable: true,
            hard_gate: false,
            dual_only: false,
        });
        let ordered = order(&phases, false).unwrap();
        let names: Vec<&str> = ordered.iter().map(|phase| phase.name).collect();
        let probe = names
            .iter()
            .position(|name| *name == "plinth.configure.metricsProbe")
            .unwrap();
        let routes = names
            .iter()
            .position(|name| *name == super::names::CONFIGURE_ROUTES)
            .unwrap();
        assert!(probe > routes);
        // declared last among its peers, so it runs after everything declared
        // before it with satisfied dependencies
        assert_eq!(probe, names.len() - 1);
    }

    #[test]
    fn cycles_are_rejected() {
        let phases = vec![
            Phase {
                name: "a",
                depends_on: &["b"],
                cancelable: false,
                hard_gate: false,
                dual_only: false,
            },
            Phase {
                name: "b",
                depends_on: &["a"],
                cancelable: false,
                hard_gate: false,
                dual_only: false,
            },
        ];
        assert!(matches!(
            order(&phases, false),
            Err(AbortReason::Configuration(_))
        ));
    }

    #[test]
    fn ready_gates_are_hard() {
        let phases = builtin_phases();
        for name in [names::READY, names::ENGINE_READY] {
            let phase = phases.iter().find(|phase| phase.name == name).unwrap();
            assert!(phase.hard_gate);
            assert!(!phase.cancelable);
        }
    }
}
