//! The equation-group protocol used by hand-written model blocks.
use crate::store::Store;

/// A named block of equations that, for period `t`, reads whatever it needs
/// from the store and writes its updated variables back.
///
/// Groups handle their own guards: missing lags at the start of the horizon,
/// non-positive logarithm arguments, near-zero denominators (see
/// [`crate::compute::kernel`]).
pub trait EquationGroup {
    fn name(&self) -> &str;
    fn solve(&self, store: &mut Store, t: usize);
}

pub type BoxedGroup = Box<dyn EquationGroup + Send + Sync>;

/// An `EquationGroup` backed by a closure.
pub struct FnGroup<F> {
    name: String,
    f: F,
}

impl<F> EquationGroup for FnGroup<F>
where
    F: Fn(&mut Store, usize),
{
    fn name(&self) -> &str { &self.name }

    fn solve(&self, store: &mut Store, t: usize) {
        (self.f)(store, t)
    }
}

pub fn group<F>(name: impl Into<String>, f: F) -> BoxedGroup
where
    F: Fn(&mut Store, usize) + Send + Sync + 'static,
{
    Box::new(FnGroup { name: name.into(), f })
}
