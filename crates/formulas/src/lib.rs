//! # Cellcalc Formulas
//!
//! Evaluation core for built-in worksheet functions: coercion policies,
//! scalar resolution with implicit intersection, operand flattening, the
//! function calling convention, and a registry of standard functions
//! (SUM, ROUND, COMBIN, LEN, ISERROR, etc.).

use cellcalc_primitives::{CellAddress, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub mod context;
pub mod flatten;
pub mod function;
pub mod functions;
pub mod math;
pub mod policy;
pub mod resolve;

pub use context::SheetContext;
pub use flatten::{flatten_numbers, walk_operands, DEFAULT_MAX_OPERANDS};
pub use function::{
    finish, Aggregate, Args, Arity, BinaryNumeric, BlankFallback, Combinatorial, Count, CountMode,
    Function, InfoFunction, TextFunction, UnaryNumeric,
};
pub use policy::{parse_number, Coercion, CoercionPolicy, Origin};
pub use resolve::{intersect, resolve_number, resolve_scalar, resolve_text, resolve_value};

/// Registry construction options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// Operand ceiling for multi-operand functions.
    pub max_operands: usize,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            max_operands: DEFAULT_MAX_OPERANDS,
        }
    }
}

impl RegistryOptions {
    pub fn validate(&self) -> Result<(), FormulaError> {
        if self.max_operands == 0 {
            return Err(FormulaError::InvalidOptions(
                "max_operands must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Registry of available functions
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionDefinition>,
    options: RegistryOptions,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
            options: RegistryOptions::default(),
        };

        // Register standard functions
        registry.register_standard_functions();
        registry
    }
}

impl FunctionRegistry {
    /// Build the standard registry with custom options.
    pub fn with_options(options: RegistryOptions) -> Result<Self, FormulaError> {
        options.validate()?;
        let mut registry = Self {
            functions: HashMap::new(),
            options,
        };
        registry.register_standard_functions();
        Ok(registry)
    }

    /// Register standard Excel-compatible functions
    fn register_standard_functions(&mut self) {
        let max_operands = self.options.max_operands;

        // Math functions
        for &(name, op) in functions::UNARY {
            self.register(
                name,
                FunctionDefinition::fixed(
                    vec![ParamType::Number],
                    ReturnType::Number,
                    UnaryNumeric::new(op),
                ),
            );
        }
        for &(name, op, default_second) in functions::BINARY {
            let function = match default_second {
                Some(second) => BinaryNumeric::new(op).with_default(second),
                None => BinaryNumeric::new(op),
            };
            self.register(
                name,
                FunctionDefinition::fixed(
                    vec![ParamType::Number, ParamType::Number],
                    ReturnType::Number,
                    function,
                ),
            );
        }
        self.register(
            "COMBIN",
            FunctionDefinition::fixed(
                vec![ParamType::Number, ParamType::Number],
                ReturnType::Number,
                Combinatorial::new(math::n_choose_k),
            ),
        );

        // Statistical functions
        for &(name, policy, reduce) in functions::AGGREGATES {
            self.register(
                name,
                FunctionDefinition::variadic(
                    ParamType::Number,
                    ReturnType::Number,
                    Aggregate::new(policy, reduce).with_max_operands(max_operands),
                ),
            );
        }
        self.register(
            "COUNT",
            FunctionDefinition::variadic(
                ParamType::Any,
                ReturnType::Number,
                Count::new(CountMode::Numbers).with_max_operands(max_operands),
            ),
        );
        self.register(
            "COUNTA",
            FunctionDefinition::variadic(
                ParamType::Any,
                ReturnType::Number,
                Count::new(CountMode::NonBlank).with_max_operands(max_operands),
            ),
        );

        // Text functions
        for entry in functions::TEXT {
            let definition = if entry.params.is_empty() {
                FunctionDefinition::variadic(
                    ParamType::Any,
                    entry.return_type,
                    TextFunction::new(entry.arity, entry.body),
                )
            } else {
                FunctionDefinition::fixed(
                    entry.params.to_vec(),
                    entry.return_type,
                    TextFunction::new(entry.arity, entry.body),
                )
            };
            self.register(entry.name, definition);
        }

        // Information functions
        for &(name, test) in functions::INFO {
            self.register(
                name,
                FunctionDefinition::fixed(
                    vec![ParamType::Any],
                    ReturnType::Logical,
                    InfoFunction::new(test),
                ),
            );
        }
    }

    /// Add or replace a function.
    pub fn register(&mut self, name: &str, def: FunctionDefinition) {
        self.functions.insert(name.to_uppercase(), def);
    }

    /// Check if a function exists
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_uppercase())
    }

    /// Get a function definition by name
    pub fn get(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.get(&name.to_uppercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Evaluate `name` over `operands` from the cell at `src`.
    ///
    /// Only an unknown name is a Rust error; every evaluation failure,
    /// including an unsupported operand count, comes back as an error value.
    pub fn call(
        &self,
        name: &str,
        operands: &[Value],
        src: CellAddress,
    ) -> Result<Value, FormulaError> {
        let def = self
            .get(name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;
        debug!(function = name, operands = operands.len(), cell = %src, "dispatch");
        Ok(def.function.call(operands, src))
    }
}

/// Function definition
pub struct FunctionDefinition {
    pub metadata: FunctionMetadata,
    pub function: Box<dyn Function>,
}

impl FunctionDefinition {
    /// Positional parameters
    pub fn fixed(
        params: Vec<ParamType>,
        return_type: ReturnType,
        function: impl Function + 'static,
    ) -> Self {
        Self {
            metadata: FunctionMetadata {
                params,
                variadic: None,
                return_type,
            },
            function: Box::new(function),
        }
    }

    /// Repeated parameters of one kind
    pub fn variadic(
        variadic: ParamType,
        return_type: ReturnType,
        function: impl Function + 'static,
    ) -> Self {
        Self {
            metadata: FunctionMetadata {
                params: Vec::new(),
                variadic: Some(variadic),
                return_type,
            },
            function: Box::new(function),
        }
    }

    pub fn arity(&self) -> Arity {
        self.function.arity()
    }

    pub fn expected_args_label(&self) -> String {
        self.arity().label()
    }
}

/// Formula errors
#[derive(Debug, thiserror::Error)]
pub enum FormulaError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Invalid registry options: {0}")]
    InvalidOptions(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    Any,
    Number,
    Logical,
    Text,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnType {
    Any,
    Number,
    Logical,
    Text,
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub params: Vec<ParamType>,
    pub variadic: Option<ParamType>,
    pub return_type: ReturnType,
}
