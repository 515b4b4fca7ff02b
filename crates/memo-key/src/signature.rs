//! Declared parameter lists and argument binding

use crate::error::BindError;
use crate::value::{Arg, ArgValue, Args};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    KeywordOnly,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Arg>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::PositionalOrKeyword,
            default: None,
        }
    }

    pub fn positional_only(name: impl Into<String>) -> Self {
        Self {
            kind: ParamKind::PositionalOnly,
            ..Self::new(name)
        }
    }

    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self {
            kind: ParamKind::KeywordOnly,
            ..Self::new(name)
        }
    }

    pub fn with_default(mut self, value: impl ArgValue + 'static) -> Self {
        self.default = Some(Arc::new(value));
        self
    }
}

/// Parameter list of a memoized function
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    /// Name of the `*args` catch-all, if any
    pub var_positional: Option<String>,
    /// Name of the `**kwargs` catch-all, if any
    pub var_keyword: Option<String>,
}

/// Arguments after resolution against a signature
#[derive(Debug, Clone)]
pub enum Binding {
    /// Bound by parameter name, in declaration order
    Named(Vec<(String, Arg)>),
    /// Variadic signature; arguments kept as given. Keywords sorted by name.
    Raw {
        positional: Vec<Arg>,
        keyword: Vec<(String, Arg)>,
    },
}

impl Signature {
    pub fn new(params: Vec<Param>) -> Self {
        Self {
            params,
            var_positional: None,
            var_keyword: None,
        }
    }

    /// Signature accepting anything, like `f(*args, **kwargs)`
    pub fn variadic() -> Self {
        Self {
            params: Vec::new(),
            var_positional: Some("args".to_string()),
            var_keyword: Some("kwargs".to_string()),
        }
    }

    pub fn with_var_positional(mut self, name: impl Into<String>) -> Self {
        self.var_positional = Some(name.into());
        self
    }

    pub fn with_var_keyword(mut self, name: impl Into<String>) -> Self {
        self.var_keyword = Some(name.into());
        self
    }

    pub fn is_variadic(&self) -> bool {
        self.var_positional.is_some() || self.var_keyword.is_some()
    }

    /// Resolve a call's arguments into a single name -> value mapping.
    ///
    /// With a variadic signature there is nothing reliable to bind against,
    /// so the raw structure is kept and `f(1, b=2)` stays distinct from
    /// `f(1, 2)`.
    pub fn bind(&self, args: &Args) -> Result<Binding, BindError> {
        if self.is_variadic() {
            let mut keyword = args.keyword().to_vec();
            keyword.sort_by(|a, b| a.0.cmp(&b.0));
            if let Some(pair) = keyword.windows(2).find(|pair| pair[0].0 == pair[1].0) {
                return Err(BindError::MultipleValues(pair[0].0.clone()));
            }
            return Ok(Binding::Raw {
                positional: args.positional().to_vec(),
                keyword,
            });
        }

        let mut slots: Vec<Option<Arg>> = vec![None; self.params.len()];

        let positional_params: Vec<usize> = self
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind != ParamKind::KeywordOnly)
            .map(|(i, _)| i)
            .collect();

        if args.positional().len() > positional_params.len() {
            return Err(BindError::TooManyPositional {
                expected: positional_params.len(),
                given: args.positional().len(),
            });
        }

        for (value, &idx) in args.positional().iter().zip(&positional_params) {
            slots[idx] = Some(Arc::clone(value));
        }

        for (name, value) in args.keyword() {
            let idx = self
                .params
                .iter()
                .position(|p| &p.name == name)
                .ok_or_else(|| BindError::UnexpectedKeyword(name.clone()))?;

            if self.params[idx].kind == ParamKind::PositionalOnly {
                return Err(BindError::PositionalOnlyAsKeyword(name.clone()));
            }
            if slots[idx].is_some() {
                return Err(BindError::MultipleValues(name.clone()));
            }
            slots[idx] = Some(Arc::clone(value));
        }

        let mut bound = Vec::with_capacity(self.params.len());
        for (param, slot) in self.params.iter().zip(slots) {
            let value = match slot.or_else(|| param.default.clone()) {
                Some(value) => value,
                None => return Err(BindError::MissingArgument(param.name.clone())),
            };
            bound.push((param.name.clone(), value));
        }

        Ok(Binding::Named(bound))
    }
}
