//! Abstract execution of scenarios.
//!
//! Every variable lives in a [`Region`] and every load or store goes through
//! memory [`Cell`]s, so a pointer copied through an array slot, a struct
//! field or an out-parameter keeps its provenance. Branches on values the
//! analysis cannot resolve run both arms and join the resulting states.

mod builtins;
mod state;
mod value;

use std::collections::BTreeMap;

use hashbrown::HashMap;
use itertools::Itertools;
use tracing::{debug, trace};

use crate::config::Config;
use crate::names::{Name, Names};
use crate::oracle::{Candidate, Kind, SizeEstimator};
use crate::provenance::{Contents, MergeSet, Offset, Provenance, Region, RegionClass, RegionId, Regions};
use crate::syntax::layout::{LayoutError, Layouts};
use crate::syntax::{BinOp, Expr, Fnc, Site, Suite, Type, UnOp};

use state::{Cell, State};
use value::{PtrValue, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("unknown name: '{0}'")]
    UnknownName(String),
    #[error("unknown function name: '{0}'")]
    UnknownFunction(String),
    #[error("invalid number of argument in call to '{name}', expected {expected}, found {found}")]
    InvalidArgNum { name: String, expected: usize, found: usize },
    #[error("dereference of a value that is not a pointer")]
    NotAPointer,
    #[error("expression does not designate an object")]
    NotAPlace,
    #[error("access through a pointer to void")]
    VoidAccess,
    #[error("object size kind must be in 0..=3, found {0}")]
    InvalidKind(i64),
    #[error("object size kind is not a constant")]
    NonConstantKind,
    #[error("call depth exceeded {0}")]
    CallDepth(usize),
    #[error("cannot infer the type of '{0}'")]
    UntypedLocal(String),
    #[error("standalone let expression")]
    StandaloneLet,
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

pub(crate) type Env = im::HashMap<Name, Binding>;

/// Join passes over a loop body before offsets that keep moving are widened.
const JOIN_PASSES: usize = 2;
/// Passes after which values still changing at the loop head lose their provenance.
const MAX_LOOP_PASSES: usize = 32;

/// Syntax node that creates a region, paired with the call depth it ran at.
type AllocSite = (usize, usize);

#[derive(Debug, Clone)]
pub(crate) struct Binding {
    region: RegionId,
    ty: Type,
}

/// An lvalue: the objects an expression may designate, and their type.
#[derive(Debug, Clone)]
struct Place {
    targets: MergeSet,
    ty: Type,
}

impl Place {
    fn object(region: RegionId, ty: Type) -> Self {
        Self { targets: MergeSet::object(region), ty }
    }
}

/// One evaluated `check!`.
#[derive(Debug, Clone)]
pub(crate) struct CheckRecord {
    pub function: String,
    pub site: Site,
    /// `(expected, actual)`, absent when an operand is not a constant.
    pub values: Option<(u64, u64)>,
}

#[derive(Debug, Default)]
struct Frame {
    function: String,
    returns: Vec<(Value, State)>,
    /// Parameters and `alloca` storage released when the call returns.
    scoped: Vec<RegionId>,
}

pub(crate) struct Interpreter<'s> {
    suite: &'s Suite,
    config: &'s Config,
    estimator: &'s dyn SizeEstimator,
    layouts: Layouts<'s>,
    regions: Regions,
    names: Names,
    globals: Env,
    state: State,
    frames: Vec<Frame>,
    /// Nesting depth of loop passes whose checks are not recorded.
    silent: usize,
    /// Nesting depth of loops being evaluated.
    loops: usize,
    /// Regions created inside loops, reused by every pass over the same site.
    sites: HashMap<AllocSite, RegionId>,
    /// Node of the call being evaluated, for builtins that allocate.
    call_site: usize,
    checks: Vec<CheckRecord>,
}

impl<'s> Interpreter<'s> {
    pub fn new(suite: &'s Suite, config: &'s Config, estimator: &'s dyn SizeEstimator) -> Result<Self, EvalError> {
        let layouts = Layouts::new(config.target, &suite.structs);
        let mut this = Self {
            suite,
            config,
            estimator,
            layouts,
            regions: Regions::default(),
            names: Names::default(),
            globals: Env::default(),
            state: State::default(),
            frames: Vec::new(),
            silent: 0,
            loops: 0,
            sites: HashMap::new(),
            call_site: 0,
            checks: Vec::new(),
        };
        for (name, global) in &suite.globals {
            let class = if global.thread_local { RegionClass::ThreadLocal } else { RegionClass::Global };
            let region = this.alloc_object(site_of(global), name, class, &global.ty, Contents::Zeroed)?;
            let key = this.names.get_str(name);
            this.globals.insert(key, Binding { region, ty: global.ty.clone() });
        }
        Ok(this)
    }

    pub fn run(&mut self, scenario: &str) -> Result<(), EvalError> {
        let suite = self.suite;
        let fnc = suite
            .fncs
            .get(scenario)
            .ok_or_else(|| EvalError::UnknownFunction(scenario.to_string()))?;
        self.call_fnc(scenario, fnc, Vec::new())?;
        debug!(scenario, regions = self.regions.len(), names = self.names.len(), "scenario evaluated");
        Ok(())
    }

    pub fn take_checks(&mut self) -> Vec<CheckRecord> {
        std::mem::take(&mut self.checks)
    }

    fn alloc_object(
        &mut self,
        site: usize,
        label: &str,
        class: RegionClass,
        ty: &Type,
        contents: Contents,
    ) -> Result<RegionId, EvalError> {
        let size = self.layouts.size_of(ty)?;
        Ok(self.alloc_region(site, Region { label: label.to_string(), class, size, contents }))
    }

    /// Allocate a region for the object created at `site`.
    ///
    /// Inside a loop, every pass over the same site gets the same region back
    /// (live again), so the loop-head state can stop changing.
    fn alloc_region(&mut self, site: usize, region: Region) -> RegionId {
        if self.loops == 0 {
            return self.regions.alloc(region);
        }
        let key = (site, self.frames.len());
        if let Some(&id) = self.sites.get(&key) {
            if self.regions.get(id).size == region.size {
                *self.regions.get_mut(id) = region;
                self.state.freed.remove(&id);
                return id;
            }
        }
        let id = self.regions.alloc(region);
        self.sites.insert(key, id);
        id
    }

    fn declare(&mut self, site: usize, name: &str, ty: &Type, env: &mut Env) -> Result<RegionId, EvalError> {
        let region = self.alloc_object(site, name, RegionClass::Stack, ty, Contents::Uninit)?;
        env.insert(self.names.get_str(name), Binding { region, ty: ty.clone() });
        Ok(region)
    }

    fn call_fnc(&mut self, name: &str, fnc: &'s Fnc, args: Vec<Value>) -> Result<Value, EvalError> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(EvalError::CallDepth(self.config.max_call_depth));
        }
        expect_args(name, fnc.ty.params.len(), args.len())?;

        let mut env = Env::default();
        self.frames.push(Frame { function: name.to_string(), ..Frame::default() });
        let body = self.bind_params(fnc, args, &mut env).and_then(|()| self.eval(&fnc.body, &mut env));
        let frame = self.frames.pop().unwrap_or_default();
        let body = body?;

        let mut value = if self.state.unreachable { None } else { Some(body) };
        for (ret, state) in frame.returns {
            self.state = self.state.join(&state, &self.regions);
            value = Some(match value {
                Some(value) => value.join(&ret),
                None => ret,
            });
        }
        for region in frame.scoped {
            self.state.freed.insert(region);
        }
        Ok(match (value, &fnc.ty.ret) {
            (_, Type::Void) => Value::Unit,
            (Some(value), ret) => value.coerce(ret),
            (None, _) => Value::Uninit,
        })
    }

    fn bind_params(&mut self, fnc: &Fnc, args: Vec<Value>, env: &mut Env) -> Result<(), EvalError> {
        for (param, arg) in fnc.ty.params.iter().zip(args) {
            let region = self.declare(site_of(param), &param.name, &param.ty, env)?;
            if let Some(frame) = self.frames.last_mut() {
                frame.scoped.push(region);
            }
            self.store(&Place::object(region, param.ty.clone()), arg)?;
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr, env: &mut Env) -> Result<Value, EvalError> {
        if self.state.unreachable {
            return Ok(Value::Uninit);
        }
        match expr {
            Expr::Const(val) => Ok(Value::Int(*val)),
            Expr::Str(text) => Ok(self.string_literal(site_of(expr), text)),
            Expr::Null => Ok(Value::ptr(Type::Void, MergeSet::null())),
            Expr::SizeOf(ty) => Ok(Value::Int(self.layouts.size_of(ty)? as i64)),
            Expr::SizeOfVal(expr) => {
                let inner = match &**expr {
                    Expr::AddrOf(inner) => &**inner,
                    other => other,
                };
                let place = self.place(inner, env)?;
                Ok(Value::Int(self.layouts.size_of(&place.ty)? as i64))
            }
            Expr::OffsetOf { ty, field } => Ok(Value::Int(self.layouts.field_of(ty, field)?.offset as i64)),
            Expr::Var(_) | Expr::Deref(_) | Expr::Index { .. } | Expr::Field { .. } => {
                let place = self.place(expr, env)?;
                self.load(&place)
            }
            Expr::AddrOf(expr) => {
                let place = self.place(expr, env)?;
                Ok(Value::ptr(place.ty, place.targets))
            }
            Expr::BinOp { op, left, right } => {
                let lhs = self.eval(left, env)?;
                let rhs = self.eval(right, env)?;
                self.binop(*op, lhs, rhs)
            }
            Expr::UnOp { op, expr } => {
                let val = self.eval(expr, env)?;
                Ok(unop(*op, val))
            }
            Expr::Cast { expr, ty } => {
                let val = self.eval(expr, env)?;
                Ok(match ty {
                    Type::Void => Value::Unit,
                    _ => val.coerce(ty),
                })
            }
            Expr::Ite { cond, then_branch, else_branch } => {
                self.eval_ite(cond, then_branch, else_branch.as_deref(), env)
            }
            Expr::While { cond, body } => {
                let entry = self.eval(cond, env)?;
                if entry.truth() != Some(false) {
                    self.eval_loop(Some(&**cond), body, env)?;
                }
                Ok(Value::Unit)
            }
            Expr::For { var, start, end, body } => self.eval_for(var, start, end, body, env),
            Expr::Let { .. } => Err(EvalError::StandaloneLet),
            Expr::Assign { place, rhs } => {
                let val = self.eval(rhs, env)?;
                let place = self.place(place, env)?;
                self.store(&place, val)?;
                Ok(Value::Unit)
            }
            Expr::AssignOp { op, place, rhs } => {
                let place = self.place(place, env)?;
                let current = self.load(&place)?;
                let rhs = self.eval(rhs, env)?;
                let val = self.binop(*op, current, rhs)?;
                self.store(&place, val)?;
                Ok(Value::Unit)
            }
            Expr::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, env))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call_site = site_of(expr);
                self.call(name, args)
            }
            Expr::ObjectSize { ptr, kind } => self.eval_object_size(ptr, kind, env),
            Expr::Check { actual, expected, site } => {
                let actual = self.eval(actual, env)?;
                let expected = self.eval(expected, env)?;
                if self.silent == 0 {
                    let function = self.frames.last().map(|f| f.function.clone()).unwrap_or_default();
                    let values = expected.as_int().zip(actual.as_int()).map(|(e, a)| (e as u64, a as u64));
                    debug!(%function, line = site.line, ?values, "check");
                    self.checks.push(CheckRecord { function, site: site.clone(), values });
                }
                Ok(Value::Unit)
            }
            Expr::Return(expr) => {
                let val = match expr {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Unit,
                };
                let state = self.state.clone();
                if let Some(frame) = self.frames.last_mut() {
                    frame.returns.push((val, state));
                }
                self.state.unreachable = true;
                Ok(Value::Uninit)
            }
            Expr::Block(stmts) => self.eval_block(stmts, env),
            Expr::Unit => Ok(Value::Unit),
        }
    }

    fn eval_block(&mut self, stmts: &[Expr], env: &Env) -> Result<Value, EvalError> {
        let mut env = env.clone();
        let mut locals = Vec::new();
        let mut last = Value::Unit;
        for stmt in stmts {
            last = match stmt {
                Expr::Let { name, ty, init } => {
                    locals.push(self.eval_let(site_of(stmt), name, ty.as_ref(), init.as_deref(), &mut env)?);
                    Value::Unit
                }
                _ => self.eval(stmt, &mut env)?,
            };
        }
        // Block-scoped storage ends with the block.
        for region in locals {
            self.state.freed.insert(region);
        }
        Ok(last)
    }

    fn eval_let(
        &mut self,
        site: usize,
        name: &str,
        ty: Option<&Type>,
        init: Option<&Expr>,
        env: &mut Env,
    ) -> Result<RegionId, EvalError> {
        let val = match init {
            Some(init) => Some(self.eval(init, env)?),
            None => None,
        };
        let ty = match (ty, &val) {
            (Some(ty), _) => ty.clone(),
            (None, Some(val)) => value_type(val).ok_or_else(|| EvalError::UntypedLocal(name.to_string()))?,
            (None, None) => return Err(EvalError::UntypedLocal(name.to_string())),
        };
        let region = self.declare(site, name, &ty, env)?;
        let is_array = matches!(ty, Type::Array(..));
        match (init, val) {
            // `char s[] = "..."` copies the text into the array.
            (Some(Expr::Str(text)), _) if is_array => {
                self.regions.get_mut(region).contents = Contents::CStr(text.len() as u64);
            }
            (_, Some(val)) => self.store(&Place::object(region, ty), val)?,
            (_, None) => {}
        }
        Ok(region)
    }

    fn eval_ite(
        &mut self,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
        env: &mut Env,
    ) -> Result<Value, EvalError> {
        let cond = self.eval(cond, env)?;
        match cond.truth() {
            Some(true) => self.eval(then_branch, env),
            Some(false) => match else_branch {
                Some(else_branch) => self.eval(else_branch, env),
                None => Ok(Value::Unit),
            },
            None => {
                let pre = self.state.clone();
                let then_value = self.eval(then_branch, env)?;
                let then_state = std::mem::replace(&mut self.state, pre);
                let else_value = match else_branch {
                    Some(else_branch) => self.eval(else_branch, env)?,
                    None => Value::Unit,
                };
                let value = match (then_state.unreachable, self.state.unreachable) {
                    (true, _) => else_value,
                    (_, true) => then_value,
                    _ => then_value.join(&else_value),
                };
                self.state = then_state.join(&self.state, &self.regions);
                Ok(value)
            }
        }
    }

    /// Loop body as a merge of the pre-loop state with every back-edge.
    ///
    /// Silent passes grow the loop-head state until it stops changing: plain
    /// joins first, then widening of pointers that keep moving. Values still
    /// changing after `MAX_LOOP_PASSES` lose their provenance. The final pass
    /// runs from the stable head and records its checks.
    fn eval_loop(&mut self, cond: Option<&Expr>, body: &Expr, env: &mut Env) -> Result<(), EvalError> {
        self.loops += 1;
        let result = self.loop_fixpoint(cond, body, env);
        self.loops -= 1;
        result
    }

    fn loop_fixpoint(&mut self, cond: Option<&Expr>, body: &Expr, env: &mut Env) -> Result<(), EvalError> {
        let mut head = self.state.clone();
        let mut passes = 0;
        loop {
            self.state = head.clone();
            self.silently(|this| this.loop_pass(cond, body, env))?;
            passes += 1;
            let next = if passes <= JOIN_PASSES {
                head.join(&self.state, &self.regions)
            } else if passes < MAX_LOOP_PASSES {
                head.widen(&self.state, &self.regions)
            } else {
                head.forget_changed(&self.state, &self.regions)
            };
            let stable = next == head;
            head = next;
            if stable || passes >= MAX_LOOP_PASSES {
                break;
            }
        }
        trace!(passes, "loop head settled");

        self.state = head.clone();
        self.loop_pass(cond, body, env)?;
        self.state = head.join(&self.state, &self.regions);
        Ok(())
    }

    /// One iteration: the body, then the condition guarding the next one.
    fn loop_pass(&mut self, cond: Option<&Expr>, body: &Expr, env: &mut Env) -> Result<(), EvalError> {
        self.eval(body, env)?;
        if let Some(cond) = cond {
            self.eval(cond, env)?;
        }
        Ok(())
    }

    fn eval_for(&mut self, var: &str, start: &Expr, end: &Expr, body: &Expr, env: &mut Env) -> Result<Value, EvalError> {
        let start = self.eval(start, env)?;
        let end = self.eval(end, env)?;
        if let (Some(start), Some(end)) = (start.as_int(), end.as_int()) {
            if start >= end {
                return Ok(Value::Unit);
            }
        }
        let mut env = env.clone();
        let region = self.declare(site_of(body), var, &Type::LONG, &mut env)?;
        self.store(&Place::object(region, Type::LONG), Value::Opaque)?;
        self.eval_loop(None, body, &mut env)?;
        self.state.freed.insert(region);
        Ok(Value::Unit)
    }

    fn silently<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, EvalError>) -> Result<T, EvalError> {
        self.silent += 1;
        let result = f(self);
        self.silent -= 1;
        result
    }

    fn eval_object_size(&mut self, ptr: &Expr, kind: &Expr, env: &mut Env) -> Result<Value, EvalError> {
        let kind = match self.eval(kind, env)?.as_int() {
            Some(value) => Kind::from_value(value).ok_or(EvalError::InvalidKind(value))?,
            None => return Err(EvalError::NonConstantKind),
        };
        let size = if ptr.has_side_effects() {
            // The argument is never evaluated.
            self.estimator.side_effecting(kind)
        } else {
            let val = self.eval(ptr, env)?;
            let targets = val.targets();
            let candidates = self.candidates(&targets);
            let regions = targets.iter().filter_map(Provenance::region).map(|region| self.regions.get(region)).join(", ");
            trace!(%kind, ?candidates, %regions, "object_size query");
            self.estimator.object_size(&candidates, kind)
        };
        Ok(Value::Int(size as i64))
    }

    fn candidates(&self, targets: &MergeSet) -> Vec<Candidate> {
        targets
            .iter()
            .map(|prov| match *prov {
                Provenance::Null => Candidate::Null,
                Provenance::Unknown => Candidate::Unknown,
                Provenance::Object { region, offset } => {
                    let size = self.regions.get(region).size;
                    if self.state.is_freed(region) {
                        Candidate::Freed { size, offset }
                    } else {
                        Candidate::Live { size, offset }
                    }
                }
            })
            .collect()
    }

    fn string_literal(&mut self, site: usize, text: &str) -> Value {
        let len = text.len() as u64;
        let region = self.alloc_region(site, Region {
            label: format!("{text:?}"),
            class: RegionClass::Global,
            size: len + 1,
            contents: Contents::CStr(len),
        });
        Value::ptr(Type::CHAR, MergeSet::object(region))
    }

    fn place(&mut self, expr: &Expr, env: &mut Env) -> Result<Place, EvalError> {
        match expr {
            Expr::Var(name) => {
                let binding = env
                    .get(name.as_str())
                    .or_else(|| self.globals.get(name.as_str()))
                    .ok_or_else(|| EvalError::UnknownName(name.clone()))?;
                Ok(Place::object(binding.region, binding.ty.clone()))
            }
            Expr::Deref(expr) => {
                let val = self.eval(expr, env)?;
                deref(val)
            }
            Expr::Index { base, index } if is_place(base) => {
                let base = self.place(base, env)?;
                let index = self.eval(index, env)?;
                match &base.ty {
                    Type::Array(elem, _) => {
                        let stride = self.layouts.size_of(elem)?;
                        Ok(Place { ty: (**elem).clone(), targets: base.targets.offset_by(scale(&index, stride, false)) })
                    }
                    _ => {
                        let ptr = self.load(&base)?;
                        self.index_ptr(ptr, &index)
                    }
                }
            }
            Expr::Index { base, index } => {
                let ptr = self.eval(base, env)?;
                let index = self.eval(index, env)?;
                self.index_ptr(ptr, &index)
            }
            Expr::Field { base, name } => {
                let base = if is_place(base) {
                    self.place(base, env)?
                } else {
                    let val = self.eval(base, env)?;
                    deref(val)?
                };
                // `p.f` on a pointer to an aggregate reads through the pointer.
                let base = match &base.ty {
                    Type::Ptr(_) => deref(self.load(&base)?)?,
                    _ => base,
                };
                let field = self.layouts.field_of(&base.ty, name)?;
                Ok(Place { ty: field.ty.clone(), targets: base.targets.offset_by(Offset::Known(field.offset as i64)) })
            }
            _ => Err(EvalError::NotAPlace),
        }
    }

    fn index_ptr(&self, ptr: Value, index: &Value) -> Result<Place, EvalError> {
        match ptr {
            Value::Ptr(PtrValue { pointee, targets }) => {
                let stride = self.layouts.stride_of(&pointee)?;
                Ok(Place { targets: targets.offset_by(scale(index, stride, false)), ty: pointee })
            }
            _ => Err(EvalError::NotAPointer),
        }
    }

    fn load(&self, place: &Place) -> Result<Value, EvalError> {
        match &place.ty {
            Type::Array(elem, _) => Ok(Value::ptr((**elem).clone(), place.targets.clone())),
            Type::Name(_) => Ok(Value::Bytes { from: place.targets.clone(), size: self.layouts.size_of(&place.ty)? }),
            Type::Void => Err(EvalError::VoidAccess),
            ty => {
                let mut loaded: Option<Value> = None;
                for prov in place.targets.iter() {
                    let val = match *prov {
                        Provenance::Object { region, offset: Offset::Known(offset) } => {
                            self.state.read(Cell { region, offset }, &self.regions)
                        }
                        Provenance::Object { region, offset: Offset::Variable } => self.read_any(region),
                        Provenance::Null | Provenance::Unknown => Value::Uninit,
                    };
                    loaded = Some(match loaded {
                        Some(acc) => acc.join(&val),
                        None => val,
                    });
                }
                Ok(loaded.unwrap_or(Value::Uninit).coerce(ty))
            }
        }
    }

    /// Any value stored in `region`, for a read at an unknown offset.
    fn read_any(&self, region: RegionId) -> Value {
        let initial = match self.regions.get(region).contents {
            Contents::Zeroed => Value::Int(0),
            _ => Value::Uninit,
        };
        self.state
            .cells
            .iter()
            .filter(|(cell, _)| cell.region == region)
            .fold(initial, |acc, (_, val)| acc.join(val))
    }

    fn store(&mut self, place: &Place, val: Value) -> Result<(), EvalError> {
        if self.state.unreachable {
            return Ok(());
        }
        if let Value::Bytes { from, size } = val {
            return self.copy_bytes(&place.targets, &from, size);
        }
        let val = val.coerce(&place.ty);
        // Several candidate targets: any of them may be the one written.
        let strong = place.targets.len() == 1;
        for prov in place.targets.iter() {
            match *prov {
                Provenance::Object { region, offset: Offset::Known(offset) } => {
                    let cell = Cell { region, offset };
                    let new = if strong { val.clone() } else { self.state.read(cell, &self.regions).join(&val) };
                    self.state.cells.insert(cell, new);
                }
                Provenance::Object { region, offset: Offset::Variable } => {
                    let touched: Vec<_> = self.state.cells.keys().filter(|cell| cell.region == region).copied().collect();
                    for cell in touched {
                        let new = self.state.read(cell, &self.regions).join(&val);
                        self.state.cells.insert(cell, new);
                    }
                }
                Provenance::Null | Provenance::Unknown => {}
            }
        }
        Ok(())
    }

    /// Copy the cells of `size` bytes at `src` to `dst` (aggregate assignment,
    /// `memcpy`, `realloc`).
    fn copy_bytes(&mut self, dst: &MergeSet, src: &MergeSet, size: u64) -> Result<(), EvalError> {
        let size = i64::try_from(size).unwrap_or(i64::MAX);
        let sources: Vec<_> = src
            .iter()
            .filter_map(|prov| match *prov {
                Provenance::Object { region, offset: Offset::Known(base) } => Some((region, base)),
                _ => None,
            })
            .collect();
        let mut bytes: BTreeMap<i64, (Value, usize)> = BTreeMap::new();
        for (region, base) in &sources {
            for (cell, val) in self.state.cells.iter() {
                if cell.region != *region || !byte_span(*base, size).contains(&cell.offset) {
                    continue;
                }
                if let Some(rel) = cell.offset.checked_sub(*base) {
                    let entry = bytes.entry(rel).or_insert((val.clone(), 0));
                    entry.0 = entry.0.join(val);
                    entry.1 += 1;
                }
            }
        }
        // Bytes written in only some sources may be uninitialized.
        let all = sources.len().max(1);
        let bytes: Vec<(i64, Value)> = bytes
            .into_iter()
            .map(|(rel, (val, seen))| (rel, if seen < all { val.join(&Value::Uninit) } else { val }))
            .collect();

        let strong = dst.len() == 1 && src.len() == 1;
        for prov in dst.iter() {
            let Provenance::Object { region, offset: Offset::Known(base) } = *prov else {
                continue;
            };
            if strong {
                let stale: Vec<_> = self
                    .state
                    .cells
                    .keys()
                    .filter(|cell| cell.region == region && byte_span(base, size).contains(&cell.offset))
                    .copied()
                    .collect();
                for cell in stale {
                    self.state.cells.remove(&cell);
                }
            }
            for (rel, val) in &bytes {
                let Some(offset) = base.checked_add(*rel) else {
                    continue;
                };
                let cell = Cell { region, offset };
                let new = if strong { val.clone() } else { self.state.read(cell, &self.regions).join(val) };
                self.state.cells.insert(cell, new);
            }
        }
        Ok(())
    }

    fn binop(&self, op: BinOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
        Ok(match (op, lhs, rhs) {
            (BinOp::Add, Value::Ptr(_), Value::Ptr(_)) => Value::Opaque,
            (BinOp::Add, Value::Ptr(ptr), n) | (BinOp::Add, n, Value::Ptr(ptr)) => self.advance(ptr, &n, false)?,
            (BinOp::Sub, Value::Ptr(a), Value::Ptr(b)) => self.ptr_diff(&a, &b)?,
            (BinOp::Sub, Value::Ptr(ptr), n) => self.advance(ptr, &n, true)?,
            (BinOp::Sub, Value::Addr(_), Value::Addr(_)) => Value::Opaque,
            (BinOp::Add, Value::Addr(addr), n) | (BinOp::Add, n, Value::Addr(addr)) => {
                Value::Addr(addr.offset_by(scale(&n, 1, false)))
            }
            (BinOp::Sub, Value::Addr(addr), n) => Value::Addr(addr.offset_by(scale(&n, 1, true))),
            (op @ (BinOp::Eq | BinOp::Ne), lhs, rhs) if is_address(&lhs) || is_address(&rhs) => {
                match same_address(&lhs.targets(), &rhs.targets()) {
                    Some(eq) => Value::Int(i64::from(eq == (op == BinOp::Eq))),
                    None => Value::Opaque,
                }
            }
            (BinOp::And, lhs, rhs) if lhs.truth() == Some(false) || rhs.truth() == Some(false) => Value::Int(0),
            (BinOp::Or, lhs, rhs) if lhs.truth() == Some(true) || rhs.truth() == Some(true) => Value::Int(1),
            (BinOp::And | BinOp::Or, lhs, rhs) => match (lhs.truth(), rhs.truth()) {
                (Some(a), Some(b)) => Value::Int(i64::from(if op == BinOp::And { a && b } else { a || b })),
                _ => Value::Opaque,
            },
            (op, Value::Int(a), Value::Int(b)) => int_binop(op, a, b),
            _ => Value::Opaque,
        })
    }

    fn advance(&self, ptr: PtrValue, n: &Value, negate: bool) -> Result<Value, EvalError> {
        let stride = self.layouts.stride_of(&ptr.pointee)?;
        let targets = ptr.targets.offset_by(scale(n, stride, negate));
        Ok(Value::ptr(ptr.pointee, targets))
    }

    fn ptr_diff(&self, a: &PtrValue, b: &PtrValue) -> Result<Value, EvalError> {
        let stride = self.layouts.stride_of(&a.pointee)?.max(1) as i64;
        Ok(match (a.targets.as_single(), b.targets.as_single()) {
            (
                Some(Provenance::Object { region: ra, offset: Offset::Known(oa) }),
                Some(Provenance::Object { region: rb, offset: Offset::Known(ob) }),
            ) if ra == rb => Value::Int((oa - ob) / stride),
            _ => Value::Opaque,
        })
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        if let Ok(builtin) = name.parse() {
            return self.call_builtin(builtin, args);
        }
        let suite = self.suite;
        if let Some(fnc) = suite.fncs.get(name) {
            return self.call_fnc(name, fnc, args);
        }
        if let Some(ext) = suite.externs.get(name) {
            return self.call_extern(name, ext, args);
        }
        Err(EvalError::UnknownFunction(name.to_string()))
    }
}

/// Offsets of `size` bytes starting at `base`, cut short at the end of the address space.
fn byte_span(base: i64, size: i64) -> std::ops::Range<i64> {
    base..base.saturating_add(size)
}

/// Identity of a syntax node of the suite being run.
fn site_of<T>(node: &T) -> usize {
    std::ptr::from_ref(node).addr()
}

fn expect_args(name: &str, expected: usize, found: usize) -> Result<(), EvalError> {
    if expected == found {
        Ok(())
    } else {
        Err(EvalError::InvalidArgNum { name: name.to_string(), expected, found })
    }
}

fn is_place(expr: &Expr) -> bool {
    matches!(expr, Expr::Var(_) | Expr::Deref(_) | Expr::Index { .. } | Expr::Field { .. })
}

fn is_address(val: &Value) -> bool {
    matches!(val, Value::Ptr(_) | Value::Addr(_))
}

fn deref(val: Value) -> Result<Place, EvalError> {
    match val {
        Value::Ptr(PtrValue { pointee, targets }) => Ok(Place { targets, ty: pointee }),
        _ => Err(EvalError::NotAPointer),
    }
}

/// Byte offset of `n` elements of `stride` bytes.
fn scale(n: &Value, stride: u64, negate: bool) -> Offset {
    match n.as_int() {
        Some(n) => {
            let n = if negate { n.checked_neg() } else { Some(n) };
            n.and_then(|n| n.checked_mul(stride as i64))
                .map_or(Offset::Variable, Offset::Known)
        }
        None => Offset::Variable,
    }
}

/// Type given to a `let` without annotation.
fn value_type(val: &Value) -> Option<Type> {
    match val {
        Value::Ptr(ptr) => Some(Type::ptr(ptr.pointee.clone())),
        Value::Int(_) | Value::Opaque | Value::Addr(_) => Some(Type::LONG),
        Value::Bytes { .. } | Value::Uninit | Value::Unit => None,
    }
}

/// Whether two addresses are statically known to be equal or distinct.
fn same_address(a: &MergeSet, b: &MergeSet) -> Option<bool> {
    if a.contains_unknown() || b.contains_unknown() {
        return None;
    }
    let is_null = |set: &MergeSet| set.iter().all(|prov| *prov == Provenance::Null);
    match (a.as_single(), b.as_single()) {
        (Some(pa), Some(pb)) if pa == pb && !matches!(pa, Provenance::Object { offset: Offset::Variable, .. }) => {
            Some(true)
        }
        (Some(pa), Some(pb)) if pa.region().is_some() && pb.region().is_some() && pa.region() != pb.region() => {
            Some(false)
        }
        _ if is_null(a) && !b.contains_null() => Some(false),
        _ if is_null(b) && !a.contains_null() => Some(false),
        _ => None,
    }
}

fn unop(op: UnOp, val: Value) -> Value {
    match (op, val) {
        (UnOp::Neg, Value::Int(n)) => Value::Int(n.wrapping_neg()),
        (UnOp::Not, val) => match val.truth() {
            Some(truth) => Value::Int(i64::from(!truth)),
            None => Value::Opaque,
        },
        _ => Value::Opaque,
    }
}

fn int_binop(op: BinOp, a: i64, b: i64) -> Value {
    let shift = |b: i64| u32::try_from(b).ok();
    let val = match op {
        BinOp::Add => Some(a.wrapping_add(b)),
        BinOp::Sub => Some(a.wrapping_sub(b)),
        BinOp::Mul => Some(a.wrapping_mul(b)),
        BinOp::Div => a.checked_div(b),
        BinOp::Rem => a.checked_rem(b),
        BinOp::BitAnd => Some(a & b),
        BinOp::BitOr => Some(a | b),
        BinOp::BitXor => Some(a ^ b),
        BinOp::Shl => shift(b).and_then(|b| a.checked_shl(b)),
        BinOp::Shr => shift(b).and_then(|b| a.checked_shr(b)),
        BinOp::And => Some(i64::from(a != 0 && b != 0)),
        BinOp::Or => Some(i64::from(a != 0 || b != 0)),
        BinOp::Eq => Some(i64::from(a == b)),
        BinOp::Ne => Some(i64::from(a != b)),
        BinOp::Lt => Some(i64::from(a < b)),
        BinOp::Le => Some(i64::from(a <= b)),
        BinOp::Gt => Some(i64::from(a > b)),
        BinOp::Ge => Some(i64::from(a >= b)),
    };
    val.map_or(Value::Opaque, Value::Int)
}
