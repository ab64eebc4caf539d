use bytes::Bytes;

/// Request type used by stubs for ordinary service calls.
pub const TYPE_RPC_REQUEST: i32 = 0;
pub const PROTOCOL_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Code {
    Success = 0,
    UnknownError = -1,
    NoProvider = -2,
    NoHandler = -3,
}

impl Code {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Code::Success),
            -1 => Some(Code::UnknownError),
            -2 => Some(Code::NoProvider),
            -3 => Some(Code::NoHandler),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub request_type: i32,
    pub version: i32,
    pub request_id: i32,
}

impl RequestHeader {
    pub fn new(request_type: i32, version: i32, request_id: i32) -> Self {
        Self {
            request_type,
            version,
            request_id,
        }
    }
}

/// Response header. `request_type` and `version` echo the request so the
/// caller can tell which exchange it belongs to without the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    pub request_type: i32,
    pub version: i32,
    pub request_id: i32,
    pub code: i32,
    pub error: Option<String>,
}

impl ResponseHeader {
    pub fn success(request: &RequestHeader) -> Self {
        Self {
            request_type: request.request_type,
            version: request.version,
            request_id: request.request_id,
            code: Code::Success.as_i32(),
            error: None,
        }
    }

    pub fn failure(request: &RequestHeader, code: Code, error: impl Into<String>) -> Self {
        Self {
            request_type: request.request_type,
            version: request.version,
            request_id: request.request_id,
            code: code.as_i32(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Code::Success.as_i32()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    Request(RequestHeader),
    Response(ResponseHeader),
}

impl Header {
    pub fn request_id(&self) -> i32 {
        match self {
            Header::Request(header) => header.request_id,
            Header::Response(header) => header.request_id,
        }
    }

    pub fn request_type(&self) -> i32 {
        match self {
            Header::Request(header) => header.request_type,
            Header::Response(header) => header.request_type,
        }
    }
}

/// Header plus already-serialized payload. Immutable once built; the
/// transport never looks inside `payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    header: Header,
    payload: Bytes,
}

impl Envelope {
    pub fn new(header: Header, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    pub fn request(header: RequestHeader, payload: impl Into<Bytes>) -> Self {
        Self::new(Header::Request(header), payload)
    }

    pub fn response(header: ResponseHeader, payload: impl Into<Bytes>) -> Self {
        Self::new(Header::Response(header), payload)
    }

    pub fn success_for(request: &RequestHeader, payload: impl Into<Bytes>) -> Self {
        Self::response(ResponseHeader::success(request), payload)
    }

    pub fn failure_for(request: &RequestHeader, code: Code, error: impl Into<String>) -> Self {
        Self::response(ResponseHeader::failure(request, code, error), Bytes::new())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn request_header(&self) -> Option<&RequestHeader> {
        match &self.header {
            Header::Request(header) => Some(header),
            Header::Response(_) => None,
        }
    }

    pub fn response_header(&self) -> Option<&ResponseHeader> {
        match &self.header {
            Header::Response(header) => Some(header),
            Header::Request(_) => None,
        }
    }

    pub fn request_id(&self) -> i32 {
        self.header.request_id()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_parts(self) -> (Header, Bytes) {
        (self.header, self.payload)
    }
}
