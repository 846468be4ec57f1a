use crate::extract::{FromRequest, ParamKind};
use crate::writer::ResponseWriter;
use crate::{BoxError, RequestContext};
use async_trait::async_trait;

/// The positional path parameter names of a route pattern, handed out to keyed parameters.
#[derive(Debug)]
pub struct PathKeys {
    pattern: String,
    names: std::vec::IntoIter<String>,
}

impl PathKeys {
    pub fn new(pattern: impl Into<String>, names: Vec<String>) -> Self {
        Self { pattern: pattern.into(), names: names.into_iter() }
    }

    /// The next name for a parameter of `kind`, `None` for parameters that are not keyed.
    ///
    /// # Panics
    ///
    /// Panics when a keyed parameter finds the pattern's names used up, the handler cannot
    /// serve routes with fewer parameters than it declares.
    pub fn take_for(&mut self, kind: ParamKind) -> Option<String> {
        if kind != (ParamKind::Extractor { keyed: true }) {
            return None;
        }
        match self.names.next() {
            Some(name) => Some(name),
            None => panic!("handler: pattern {:?} has insufficient path parameters", self.pattern),
        }
    }
}

/// The parameter list of a handler, extracted left to right.
#[async_trait]
pub trait HandlerArgs: Sized + Send {
    fn kinds() -> Vec<ParamKind>;

    async fn extract(req: &RequestContext, writer: &ResponseWriter, keys: &mut PathKeys) -> Result<Self, BoxError>;
}

macro_rules! impl_handler_args_for_tuple {
    ($($param:ident)*) => {
        #[async_trait]
        impl<$($param,)*> HandlerArgs for ($($param,)*)
        where
            $($param: FromRequest,)*
        {
            fn kinds() -> Vec<ParamKind> {
                vec![$($param::KIND,)*]
            }

            #[allow(unused_variables, reason = "the empty parameter list reads nothing")]
            async fn extract(req: &RequestContext, writer: &ResponseWriter, keys: &mut PathKeys) -> Result<Self, BoxError> {
                Ok(($({
                    let key = keys.take_for($param::KIND);
                    $param::from_request(req, writer, key).await?
                },)*))
            }
        }
    };
}

impl_handler_args_for_tuple! {}
impl_handler_args_for_tuple! { A }
impl_handler_args_for_tuple! { A B }
impl_handler_args_for_tuple! { A B C }
impl_handler_args_for_tuple! { A B C D }
impl_handler_args_for_tuple! { A B C D E }
impl_handler_args_for_tuple! { A B C D E F }
impl_handler_args_for_tuple! { A B C D E F G }
impl_handler_args_for_tuple! { A B C D E F G H }
impl_handler_args_for_tuple! { A B C D E F G H I }
impl_handler_args_for_tuple! { A B C D E F G H I J }
impl_handler_args_for_tuple! { A B C D E F G H I J K }
impl_handler_args_for_tuple! { A B C D E F G H I J K L }
