use crate::extract::{HandlerArgs, ParamKind};
use crate::responder::{Reply, ReplyKind, ReturnShape};

/// What a wrapped handler takes and returns, computed once when it is wrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDescriptor {
    params: Vec<ParamKind>,
    returns: ReturnShape,
}

impl HandlerDescriptor {
    pub fn of<Args: HandlerArgs, R: Reply>() -> Self {
        Self { params: Args::kinds(), returns: R::shape() }
    }

    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    pub fn returns(&self) -> ReturnShape {
        self.returns
    }

    /// Rejects return shapes the handler adapter cannot route.
    ///
    /// # Panics
    ///
    /// Panics when the data slot of a `Result` is itself an error, an
    /// [`Outcome`](crate::Outcome) or another `Result`.
    pub(crate) fn validate(&self) {
        if let ReturnShape::Pair { data } = self.returns {
            match data {
                ReplyKind::Error => panic!("handler_fn: the data slot of a Result cannot be an error"),
                ReplyKind::Envelope => panic!("handler_fn: the data slot of a Result cannot be an Outcome"),
                ReplyKind::Pair => panic!("handler_fn: the data slot of a Result cannot be another Result"),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HandlerDescriptor;
    use crate::error::HttpError;
    use crate::extract::{Json, ParamKind, Path};
    use crate::responder::{ReplyKind, ReturnShape};
    use crate::{BoxError, Outcome, RequestContext, ResponseWriter};

    #[test]
    fn test_descriptor_of() {
        let descriptor =
            HandlerDescriptor::of::<(Path<String>, Json<String>, Path<u64>, ResponseWriter), Result<String, BoxError>>();

        assert_eq!(descriptor.params().len(), 4);
        assert_eq!(descriptor.params()[3], ParamKind::ResponseWriter);
        assert_eq!(descriptor.params()[0], ParamKind::Extractor { keyed: true });
        assert_eq!(descriptor.params()[1], ParamKind::Extractor { keyed: false });
        assert_eq!(descriptor.returns(), ReturnShape::Pair { data: ReplyKind::Data });
        descriptor.validate();
    }

    #[test]
    fn test_no_return_values() {
        let descriptor = HandlerDescriptor::of::<(ResponseWriter, RequestContext), ()>();
        assert_eq!(descriptor.returns(), ReturnShape::None);
        assert_eq!(descriptor.params(), [ParamKind::ResponseWriter, ParamKind::Request]);
        descriptor.validate();
    }

    #[test]
    #[should_panic(expected = "handler_fn: the data slot of a Result cannot be an error")]
    fn test_error_in_data_slot() {
        HandlerDescriptor::of::<(), Result<HttpError, BoxError>>().validate();
    }

    #[test]
    #[should_panic(expected = "cannot be an Outcome")]
    fn test_outcome_in_data_slot() {
        HandlerDescriptor::of::<(), Result<Outcome<String>, BoxError>>().validate();
    }

    #[test]
    #[should_panic(expected = "cannot be another Result")]
    fn test_nested_result() {
        HandlerDescriptor::of::<(), Result<Result<String, BoxError>, BoxError>>().validate();
    }
}
