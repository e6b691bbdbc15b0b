#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    request: TestRequest,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, request: TestRequest) -> Self {
        Self { name, group, request }
    }

    pub fn small(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Small, request)
    }

    pub fn normal(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Normal, request)
    }

    pub fn large(name: &'static str, request: TestRequest) -> Self {
        Self::new(name, TestGroup::Large, request)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn request(&self) -> &TestRequest {
        &self.request
    }

    /// How many routes the table under test holds for this case.
    pub fn table_size(&self) -> usize {
        match self.group {
            TestGroup::Small => 8,
            TestGroup::Normal => 64,
            TestGroup::Large => 512,
        }
    }
}

/// The parts of a request that routing and negotiation look at.
#[derive(Debug, Copy, Clone)]
pub struct TestRequest {
    target: &'static str,
    accept: &'static str,
}

impl TestRequest {
    pub const fn new(target: &'static str, accept: &'static str) -> Self {
        Self { target, accept }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn accept(&self) -> &'static str {
        self.accept
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}
